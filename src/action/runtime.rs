use std::collections::HashMap;
use tracing::{debug, instrument, trace, warn};

use super::{Action, Condition, Event, Platform, Request, RequestError, RequestId, Response};
use super::{SendRequest, SetContext};
use crate::context::{Context, Scope, GLOBAL_CONTEXT_ID};
use crate::engine::{Engine, Opts};
use crate::error::{Error, ErrorKind};
use crate::json::{DynamicValue, Map, Path};
use crate::navigation::{
    absolute_url, DeepLinkRouter, Destination, NativeRoute, Navigate, Navigator, Route, Screen,
};
use crate::result::Result;
use crate::tree::NodeId;

const ON_SUCCESS: &str = "onSuccess";
const ON_ERROR: &str = "onError";

struct PendingRequest {
    origin: NodeId,
    on_success: Vec<Action>,
    on_error: Vec<Action>,
    on_finish: Vec<Action>,
}

/// A navigation with every expression evaluated against its origin
enum Transition {
    External(String),
    Native(NativeRoute),
    ResetApplication(Destination, Option<String>),
    ResetStack(Destination),
    PushStack(Destination, Option<String>),
    PopStack,
    PushView(Destination),
    PopView,
    PopToView(String),
}

type Handoff = Option<(Option<Path>, DynamicValue)>;

/// Executes actions against the engine and the navigation state
pub struct Runtime<P> {
    engine: Engine,
    navigator: Navigator,
    router: DeepLinkRouter,
    platform: P,
    pending: HashMap<RequestId, PendingRequest>,
    next_request: u64,
}

impl<P: Platform> Runtime<P> {
    pub fn new(platform: P) -> Self {
        Self::with_opts(platform, Opts::default())
    }

    pub fn with_opts(platform: P, opts: Opts) -> Self {
        Self {
            engine: Engine::with_opts(opts),
            navigator: Navigator::new(),
            router: DeepLinkRouter::new(),
            platform,
            pending: HashMap::new(),
            next_request: 0,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Number of requests sent and not yet completed
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Map a deep link route to a native screen
    pub fn register_deep_link(&mut self, route: &str, screen: impl Into<String>) -> Result<()> {
        self.router.insert(route, screen)?;
        Ok(())
    }

    /// Present the first screen, replacing anything on display
    ///
    /// The route can only read the global context. Returns the root of the new screen.
    pub fn launch(&mut self, route: &Route) -> Result<NodeId> {
        let mut globals = Map::new();
        globals.insert(GLOBAL_CONTEXT_ID.to_owned(), self.engine.global().clone());
        let destination = route
            .destination(&globals, self.engine.base_url())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::UnresolvedContext,
                    "launch route does not evaluate to a URL",
                )
            })?;

        let screen = self.present(destination, None)?;
        let root = screen.root;
        let removed = self.navigator.reset_application(screen, None);
        self.teardown(removed);
        Ok(root)
    }

    /// Run a list of actions triggered from `origin`
    ///
    /// If the actions were triggered by an event its value is visible to them as an implicit
    /// context. Recoverable errors, such as setting a context that is not in scope, are logged
    /// and the remaining actions still run.
    #[instrument(level = "debug", skip(self, actions, event))]
    pub fn execute(
        &mut self,
        actions: &[Action],
        origin: NodeId,
        event: Option<Event>,
    ) -> Result<()> {
        if !self.engine.tree().contains(origin) {
            return Err(Error::node_not_found(origin));
        }
        let implicit: Vec<Context> = event.map(Context::from).into_iter().collect();
        self.run(actions, origin, &implicit)
    }

    /// Deliver the outcome of a request started by a SendRequest action
    ///
    /// Responses for requests whose origin has been torn down are dropped.
    #[instrument(level = "debug", skip(self, outcome))]
    pub fn complete_request(
        &mut self,
        id: RequestId,
        outcome: std::result::Result<Response, RequestError>,
    ) -> Result<()> {
        let Some(pending) = self.pending.remove(&id) else {
            warn!("unknown request");
            return Ok(());
        };
        if !self.engine.tree().contains(pending.origin) {
            debug!("request origin no longer exists, dropping response");
            return Ok(());
        }

        let (handlers, context) = match outcome {
            Ok(response) => (
                &pending.on_success,
                Context::new(
                    ON_SUCCESS,
                    DynamicValue::from_iter([
                        ("data".to_owned(), response.data),
                        ("status".to_owned(), DynamicValue::from(i64::from(response.status))),
                        ("statusText".to_owned(), response.status_text.into()),
                    ]),
                ),
            ),
            Err(error) => (
                &pending.on_error,
                Context::new(
                    ON_ERROR,
                    DynamicValue::from_iter([
                        ("data".to_owned(), error.data),
                        ("status".to_owned(), error.status.map(i64::from).into()),
                        ("statusText".to_owned(), error.status_text.into()),
                        ("message".to_owned(), error.message.into()),
                    ]),
                ),
            ),
        };

        let handled = self.run(handlers, pending.origin, std::slice::from_ref(&context));
        let finished = self.run(&pending.on_finish, pending.origin, &[]);
        handled.and(finished)
    }

    fn scope<'a>(&'a self, origin: NodeId, implicit: &'a [Context]) -> Scope<'a> {
        self.engine.scope(origin).with_implicit(implicit)
    }

    fn run(&mut self, actions: &[Action], origin: NodeId, implicit: &[Context]) -> Result<()> {
        for action in actions {
            // a navigation may have torn down the origin
            if !self.engine.tree().contains(origin) {
                debug!(action = action.kind(), "origin torn down, skipping remaining actions");
                break;
            }

            trace!(action = action.kind(), "running action");
            let result = match action {
                Action::SetContext(set) => self.set_context(set, origin, implicit),
                Action::Condition(condition) => self.condition(condition, origin, implicit),
                Action::SendRequest(request) => self.send_request(request, origin, implicit),
                Action::Navigate(navigate) => self.navigate(navigate, origin, implicit),
                Action::SubmitForm => self.submit_form(origin, implicit),
            };
            match result {
                Err(e) if e.is_recoverable() => warn!(action = action.kind(), "{e}"),
                other => other?,
            }
        }
        Ok(())
    }

    fn set_context(&mut self, action: &SetContext, origin: NodeId, implicit: &[Context]) -> Result<()> {
        let value = action.value.evaluate(&self.scope(origin, implicit));
        self.engine
            .set_context(&action.context_id, action.path.as_ref(), value, origin)
    }

    fn condition(&mut self, action: &Condition, origin: NodeId, implicit: &[Context]) -> Result<()> {
        let condition = action.condition.evaluate(&self.scope(origin, implicit));
        match condition {
            Some(true) => self.run(&action.on_true, origin, implicit),
            Some(false) => self.run(&action.on_false, origin, implicit),
            None => {
                warn!("condition does not evaluate to a boolean");
                Ok(())
            }
        }
    }

    fn send_request(
        &mut self,
        action: &SendRequest,
        origin: NodeId,
        implicit: &[Context],
    ) -> Result<()> {
        let request = {
            let scope = self.scope(origin, implicit);
            let Some(url) = action.url.evaluate(&scope) else {
                warn!("request url does not evaluate to text");
                return Ok(());
            };
            Request {
                url: absolute_url(self.engine.base_url(), &url),
                method: action
                    .method
                    .as_ref()
                    .and_then(|method| method.evaluate(&scope))
                    .unwrap_or_default(),
                headers: action
                    .headers
                    .as_ref()
                    .and_then(|headers| headers.evaluate(&scope))
                    .unwrap_or_default(),
                body: action.data.as_ref().map(|data| data.evaluate(&scope)),
            }
        };

        let id = RequestId(self.next_request);
        self.next_request += 1;
        self.pending.insert(
            id,
            PendingRequest {
                origin,
                on_success: action.on_success.clone(),
                on_error: action.on_error.clone(),
                on_finish: action.on_finish.clone(),
            },
        );

        debug!(request = %id, url = %request.url, "sending request");
        if let Err(e) = self.platform.send_request(id, request) {
            self.pending.remove(&id);
            return Err(Error::platform(e));
        }
        Ok(())
    }

    /// Run the handlers of the form enclosing `origin`
    ///
    /// The handlers run in the scope of the form node.
    fn submit_form(&mut self, origin: NodeId, implicit: &[Context]) -> Result<()> {
        let Some((node, form)) = self.engine.enclosing_form(origin) else {
            warn!("no form encloses the origin");
            return Ok(());
        };
        let form = form.clone();

        if self.platform.validate_form(&self.engine, node) {
            debug!(form = %node, "submitting form");
            self.run(&form.on_submit, node, implicit)
        } else {
            debug!(form = %node, "form has validation errors");
            self.run(&form.on_validation_error, node, implicit)
        }
    }

    /// Evaluate everything a navigation needs from its origin
    fn transition(&self, navigate: &Navigate, scope: &Scope<'_>) -> Option<Transition> {
        let base_url = self.engine.base_url();
        let destination = |route: &Route| {
            let destination = route.destination(scope, base_url);
            if destination.is_none() {
                warn!("route url does not evaluate to text");
            }
            destination
        };

        let transition = match navigate {
            Navigate::OpenExternalUrl { url } => {
                let Some(url) = url.evaluate(scope) else {
                    warn!("external url does not evaluate to text");
                    return None;
                };
                Transition::External(url)
            }
            Navigate::OpenNativeRoute(native) => {
                let Some(route) = native.route.evaluate(scope) else {
                    warn!("native route does not evaluate to text");
                    return None;
                };
                let Some((mut data, screen)) = self.router.at(&route) else {
                    warn!(route = %route, "no native screen registered for route");
                    return None;
                };
                // explicit data wins over route parameters
                data.extend(native.data.clone());
                Transition::Native(NativeRoute {
                    screen: screen.to_owned(),
                    data,
                    should_reset_application: native.should_reset_application,
                })
            }
            Navigate::ResetApplication {
                route,
                controller_id,
                ..
            } => Transition::ResetApplication(destination(route)?, controller_id.clone()),
            Navigate::ResetStack { route, .. } => Transition::ResetStack(destination(route)?),
            Navigate::PushStack {
                route,
                controller_id,
                ..
            } => Transition::PushStack(destination(route)?, controller_id.clone()),
            Navigate::PopStack { .. } => Transition::PopStack,
            Navigate::PushView { route, .. } => Transition::PushView(destination(route)?),
            Navigate::PopView { .. } => Transition::PopView,
            Navigate::PopToView { route, .. } => {
                let Some(target) = route.evaluate(scope) else {
                    warn!("pop target does not evaluate to text");
                    return None;
                };
                Transition::PopToView(target)
            }
        };
        Some(transition)
    }

    #[instrument(level = "debug", skip_all, fields(kind = navigate.kind()))]
    fn navigate(&mut self, navigate: &Navigate, origin: NodeId, implicit: &[Context]) -> Result<()> {
        // the origin may be torn down by the transition, so read everything from it first
        let (transition, handoff) = {
            let scope = self.scope(origin, implicit);
            let handoff = navigate
                .navigation_context()
                .map(|context| (context.path.clone(), context.value.evaluate(&scope)));
            (self.transition(navigate, &scope), handoff)
        };
        let Some(transition) = transition else {
            return Ok(());
        };

        match transition {
            Transition::External(url) => {
                debug!(url = %url, "opening external url");
                self.platform
                    .open_external_url(&url)
                    .map_err(Error::platform)
            }
            Transition::Native(route) => {
                debug!(screen = %route.screen, "opening native route");
                if route.should_reset_application {
                    let removed = self.navigator.clear();
                    self.teardown(removed);
                }
                self.platform
                    .open_native_route(&route)
                    .map_err(Error::platform)
            }
            Transition::ResetApplication(destination, controller_id) => {
                let screen = self.present(destination, handoff)?;
                let removed = self.navigator.reset_application(screen, controller_id);
                self.teardown(removed);
                Ok(())
            }
            Transition::ResetStack(destination) => {
                let screen = self.present(destination, handoff)?;
                let removed = self.navigator.reset_stack(screen);
                self.teardown(removed);
                Ok(())
            }
            Transition::PushStack(destination, controller_id) => {
                let screen = self.present(destination, handoff)?;
                self.navigator.push_stack(screen, controller_id);
                Ok(())
            }
            Transition::PushView(destination) => {
                let screen = self.present(destination, handoff)?;
                self.navigator.push_view(screen);
                Ok(())
            }
            Transition::PopStack => {
                let removed = self.navigator.pop_stack();
                self.reveal(removed, handoff)
            }
            Transition::PopView => {
                let removed = self.navigator.pop_view();
                self.reveal(removed, handoff)
            }
            Transition::PopToView(target) => {
                let absolute = absolute_url(self.engine.base_url(), &target);
                match self.navigator.pop_to_view(&target, &absolute) {
                    Some(removed) => self.reveal(removed, handoff),
                    None => {
                        warn!(target = %target, "no screen to pop to");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Create the root of a new screen, seed the hand-off and let the platform build it
    fn present(&mut self, destination: Destination, handoff: Handoff) -> Result<Screen> {
        let root = self.engine.create_root();
        let seeded = match handoff {
            Some((path, value)) => self
                .engine
                .seed_navigation_context(root, path.as_ref(), value),
            None => Ok(()),
        };
        let built = seeded.and_then(|_| {
            self.platform
                .build_screen(&mut self.engine, root, &destination)
                .map_err(Error::platform)
        });
        if let Err(e) = built {
            self.engine.destroy(root);
            return Err(e);
        }

        trace!(root = %root, url = ?destination.url(), "screen presented");
        Ok(Screen {
            url: destination.url().map(String::from),
            identifier: destination.identifier().map(String::from),
            root,
        })
    }

    /// Tear down dismissed screens and hand the navigation context to the screen revealed
    fn reveal(&mut self, removed: Vec<NodeId>, handoff: Handoff) -> Result<()> {
        if removed.is_empty() {
            return Ok(());
        }
        self.teardown(removed);

        match (handoff, self.navigator.current().map(|screen| screen.root)) {
            (Some((path, value)), Some(root)) => {
                self.engine
                    .seed_navigation_context(root, path.as_ref(), value)
            }
            _ => Ok(()),
        }
    }

    fn teardown(&mut self, roots: Vec<NodeId>) {
        for root in roots {
            self.platform.dismiss_screen(root);
            self.engine.destroy(root);
        }
    }
}
