use indexmap::IndexMap;
use matchit::Router;

use crate::error::{Error, ErrorKind};
use crate::result::Result;

/// Values captured by the parameters of a deep link route
pub type RouteArgs = IndexMap<String, String>;

/// Registry of native screens mapped to deep link routes
///
/// Routes use `matchit` syntax, e.g. `/profile/{id}`.
#[derive(Default, Debug, Clone)]
pub struct DeepLinkRouter(Router<String>);

impl DeepLinkRouter {
    pub fn new() -> Self {
        Self(Router::new())
    }

    /// Map a route to the name of a native screen
    ///
    /// Returns the screen previously registered for the same route.
    pub fn insert(&mut self, route: &str, screen: impl Into<String>) -> Result<Option<String>> {
        // remove the route if it already exists
        let old_screen = self.0.remove(route);

        self.0
            .insert(route, screen.into())
            .map_err(|e| Error::new(ErrorKind::InvalidRoute, e))?;

        Ok(old_screen)
    }

    /// Find the native screen matching the given path
    pub fn at(&self, path: &str) -> Option<(RouteArgs, &str)> {
        self.0
            .at(path)
            .map(|matched| {
                let args = matched
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                (args, matched.value.as_str())
            })
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn it_finds_exact_routes() {
        let mut router = DeepLinkRouter::new();
        router.insert("/settings", "SettingsScreen").unwrap();

        let (args, screen) = router.at("/settings").unwrap();
        assert!(args.is_empty());
        assert_eq!(screen, "SettingsScreen");
    }

    #[test]
    fn it_captures_route_parameters() {
        let mut router = DeepLinkRouter::new();
        router
            .insert("/users/{user}/orders/{order}", "OrderScreen")
            .unwrap();

        let (args, screen) = router.at("/users/neo/orders/42").unwrap();
        assert_eq!(screen, "OrderScreen");
        assert_eq!(args.get("user").map(String::as_str), Some("neo"));
        assert_eq!(args.get("order").map(String::as_str), Some("42"));
    }

    #[test]
    fn it_does_not_match_partial_paths() {
        let mut router = DeepLinkRouter::new();
        router.insert("/users/{user}/orders", "OrdersScreen").unwrap();

        assert!(router.at("/users/neo").is_none());
        assert!(router.at("/users/neo/orders/1").is_none());
    }

    #[test]
    fn it_replaces_existing_routes() {
        let mut router = DeepLinkRouter::new();
        router.insert("/home", "Old").unwrap();

        assert_eq!(router.insert("/home", "New").unwrap(), Some("Old".to_string()));
        assert_eq!(router.at("/home").map(|(_, s)| s), Some("New"));
    }

    #[test]
    fn it_rejects_invalid_routes() {
        let mut router = DeepLinkRouter::new();
        let err = router.insert("/users/{user", "Broken").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRoute);
    }
}
