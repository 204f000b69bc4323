// Route guard
//
// Pure navigation decisions: which screen a route resolves to given the session, and where
// the index screen sends the operator.

use crate::models::{Role, User};

pub const DEFAULT_ALLOWED_ROLES: &[Role] = &[Role::Owner, Role::Admin, Role::Editor];
pub const USER_ADMIN_ROLES: &[Role] = &[Role::Owner, Role::Admin];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Index,
    Login,
    Setup,
    Dashboard,
    CreateUser,
    NotFound,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim();
        let normalized = if trimmed.len() > 1 {
            trimmed.trim_end_matches('/')
        } else {
            trimmed
        };
        match normalized {
            "/" | "" => Route::Index,
            "/login" => Route::Login,
            "/setup" => Route::Setup,
            "/dashboard" => Route::Dashboard,
            "/create-user" => Route::CreateUser,
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Index => "/",
            Route::Login => "/login",
            Route::Setup => "/setup",
            Route::Dashboard => "/dashboard",
            Route::CreateUser => "/create-user",
            Route::NotFound => "/404",
        }
    }

    /// `None` for public routes.
    pub fn allowed_roles(&self) -> Option<&'static [Role]> {
        match self {
            Route::Dashboard => Some(DEFAULT_ALLOWED_ROLES),
            Route::CreateUser => Some(USER_ADMIN_ROLES),
            Route::Index | Route::Login | Route::Setup | Route::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still loading; show a neutral indicator.
    Wait,
    Render(Route),
    Redirect(Route),
}

/// Gate `route` behind `allowed` roles.
pub fn check_access(
    is_loading: bool,
    user: Option<&User>,
    allowed: &[Role],
    route: Route,
) -> GuardDecision {
    if is_loading {
        return GuardDecision::Wait;
    }
    match user {
        None => GuardDecision::Redirect(Route::Login),
        Some(u) if !allowed.contains(&u.role) => GuardDecision::Redirect(Route::Dashboard),
        Some(_) => GuardDecision::Render(route),
    }
}

/// Resolve navigation to `route` for the current session.
pub fn resolve(is_loading: bool, user: Option<&User>, route: Route) -> GuardDecision {
    match route.allowed_roles() {
        None => GuardDecision::Render(route),
        Some(allowed) => check_access(is_loading, user, allowed, route),
    }
}

/// Where the index screen sends the operator.
pub fn landing(user: Option<&User>, configured: bool) -> Route {
    if user.is_some() {
        Route::Dashboard
    } else if configured {
        Route::Login
    } else {
        Route::Setup
    }
}

/// The login screen is skipped once signed in.
pub fn login_redirect(user: Option<&User>) -> Option<Route> {
    user.map(|_| Route::Dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: 1,
            username: "u".into(),
            email: "u@example.com".into(),
            role,
        }
    }

    #[test]
    fn paths_round_trip() {
        for route in [
            Route::Index,
            Route::Login,
            Route::Setup,
            Route::Dashboard,
            Route::CreateUser,
        ] {
            assert_eq!(Route::from_path(route.path()), route);
        }
        assert_eq!(Route::from_path("/dashboard/"), Route::Dashboard);
        assert_eq!(Route::from_path("/settings"), Route::NotFound);
    }

    #[test]
    fn loading_waits_without_redirect() {
        assert_eq!(resolve(true, None, Route::Dashboard), GuardDecision::Wait);
        assert_eq!(
            resolve(true, Some(&user(Role::Owner)), Route::CreateUser),
            GuardDecision::Wait
        );
    }

    #[test]
    fn anonymous_is_sent_to_login_for_every_protected_route() {
        for route in [Route::Dashboard, Route::CreateUser] {
            assert_eq!(
                resolve(false, None, route),
                GuardDecision::Redirect(Route::Login)
            );
        }
    }

    #[test]
    fn editor_denied_user_creation() {
        assert_eq!(
            resolve(false, Some(&user(Role::Editor)), Route::CreateUser),
            GuardDecision::Redirect(Route::Dashboard)
        );
        assert_eq!(
            resolve(false, Some(&user(Role::Editor)), Route::Dashboard),
            GuardDecision::Render(Route::Dashboard)
        );
    }

    #[test]
    fn owner_and_admin_may_create_users() {
        for role in [Role::Owner, Role::Admin] {
            assert_eq!(
                resolve(false, Some(&user(role)), Route::CreateUser),
                GuardDecision::Render(Route::CreateUser)
            );
        }
    }

    #[test]
    fn public_routes_always_render() {
        for route in [Route::Index, Route::Login, Route::Setup, Route::NotFound] {
            assert_eq!(resolve(true, None, route), GuardDecision::Render(route));
        }
    }

    #[test]
    fn landing_follows_session_then_configuration() {
        assert_eq!(landing(Some(&user(Role::Editor)), false), Route::Dashboard);
        assert_eq!(landing(None, true), Route::Login);
        assert_eq!(landing(None, false), Route::Setup);
    }

    #[test]
    fn login_screen_redirects_when_signed_in() {
        assert_eq!(login_redirect(None), None);
        assert_eq!(
            login_redirect(Some(&user(Role::Admin))),
            Some(Route::Dashboard)
        );
    }
}
