use tracing::trace;

use crate::tree::NodeId;

/// A screen presented by the navigator
#[derive(Clone, Debug, PartialEq)]
pub struct Screen {
    /// Absolute URL the screen was loaded from, if remote
    pub url: Option<String>,
    /// Identifier declared by the screen document
    pub identifier: Option<String>,
    /// Root of the tree built for the screen
    pub root: NodeId,
}

/// A navigation flow, the screens shown by one navigation controller
#[derive(Clone, Debug, PartialEq)]
pub struct Stack {
    pub controller_id: Option<String>,
    pub screens: Vec<Screen>,
}

impl Stack {
    fn new(screen: Screen, controller_id: Option<String>) -> Self {
        Self {
            controller_id,
            screens: vec![screen],
        }
    }
}

/// Make `url` absolute using `base_url`
///
/// URLs with a scheme are returned unchanged, as are all URLs when no base is configured.
pub fn absolute_url(base_url: Option<&str>, url: &str) -> String {
    match base_url {
        Some(base) if !url.contains("://") => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ),
        _ => url.to_owned(),
    }
}

fn roots(screens: impl IntoIterator<Item = Screen>) -> Vec<NodeId> {
    screens.into_iter().map(|screen| screen.root).collect()
}

/// The screen stack state machine
///
/// The navigator only tracks which screens are presented. Every transition that dismisses
/// screens returns the roots of their trees, most recent first, so the caller can tear them
/// down.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Navigator {
    stacks: Vec<Stack>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// The screen currently on display
    pub fn current(&self) -> Option<&Screen> {
        self.stacks.last().and_then(|stack| stack.screens.last())
    }

    /// Replace every stack with a new one holding `screen`
    pub fn reset_application(
        &mut self,
        screen: Screen,
        controller_id: Option<String>,
    ) -> Vec<NodeId> {
        let removed = self.clear();
        self.stacks.push(Stack::new(screen, controller_id));
        removed
    }

    /// Dismiss every screen
    pub fn clear(&mut self) -> Vec<NodeId> {
        self.stacks
            .drain(..)
            .rev()
            .flat_map(|stack| stack.screens.into_iter().rev())
            .map(|screen| screen.root)
            .collect()
    }

    /// Replace the screens of the current stack with `screen`
    pub fn reset_stack(&mut self, screen: Screen) -> Vec<NodeId> {
        let Some(stack) = self.stacks.last_mut() else {
            self.stacks.push(Stack::new(screen, None));
            return Vec::new();
        };
        let removed = std::mem::replace(&mut stack.screens, vec![screen]);
        roots(removed.into_iter().rev())
    }

    /// Start a new flow on top of the current one
    pub fn push_stack(&mut self, screen: Screen, controller_id: Option<String>) {
        self.stacks.push(Stack::new(screen, controller_id));
    }

    /// Dismiss the current flow
    ///
    /// The last remaining stack is never removed.
    pub fn pop_stack(&mut self) -> Vec<NodeId> {
        if self.stacks.len() < 2 {
            trace!("cannot pop the last stack");
            return Vec::new();
        }
        self.stacks
            .pop()
            .map(|stack| roots(stack.screens.into_iter().rev()))
            .unwrap_or_default()
    }

    pub fn push_view(&mut self, screen: Screen) {
        match self.stacks.last_mut() {
            Some(stack) => stack.screens.push(screen),
            None => self.stacks.push(Stack::new(screen, None)),
        }
    }

    /// Dismiss the current screen
    ///
    /// Dismissing the only screen of a stack dismisses the whole stack.
    pub fn pop_view(&mut self) -> Vec<NodeId> {
        match self.stacks.last_mut() {
            Some(stack) if stack.screens.len() > 1 => {
                stack.screens.pop().map(|s| vec![s.root]).unwrap_or_default()
            }
            Some(_) => self.pop_stack(),
            None => Vec::new(),
        }
    }

    /// Dismiss every screen above the target in the current stack
    ///
    /// The target is looked up by URL first and then by identifier. `target` must already be
    /// absolute if the screen URLs are. Returns `None` if no screen matches, in which case
    /// nothing changes.
    pub fn pop_to_view(&mut self, target: &str, absolute_target: &str) -> Option<Vec<NodeId>> {
        let stack = self.stacks.last_mut()?;
        let position = stack
            .screens
            .iter()
            .rposition(|screen| screen.url.as_deref() == Some(absolute_target))
            .or_else(|| {
                stack
                    .screens
                    .iter()
                    .rposition(|screen| screen.identifier.as_deref() == Some(target))
            })?;

        let removed = stack.screens.split_off(position + 1);
        Some(roots(removed.into_iter().rev()))
    }
}
