//! # Principals
//!
//! Bridges an application's user model to security identities. A principal
//! advertises optional capabilities (role membership, group membership)
//! through accessor methods instead of inheritance: a type either returns
//! its capability view or it does not.

use crate::security::SecurityIdentity;

/// Role-bearing capability.
pub trait RoleBearer {
    /// The role names held by this value.
    fn roles(&self) -> Vec<String>;
}

/// Group-bearing capability.
pub trait GroupBearer {
    /// The group identifiers this value belongs to.
    fn groups(&self) -> Vec<String>;
}

/// An authenticated principal.
///
/// The default capability accessors return `None`; implementations opt in
/// by overriding them.
///
/// # Example
///
/// ```
/// use gatekit_identity::{IdentityResolver, Principal, RoleBearer};
///
/// struct Account {
///     name: String,
///     roles: Vec<String>,
/// }
///
/// impl RoleBearer for Account {
///     fn roles(&self) -> Vec<String> {
///         self.roles.clone()
///     }
/// }
///
/// impl Principal for Account {
///     fn username(&self) -> &str {
///         &self.name
///     }
///
///     fn as_role_bearer(&self) -> Option<&dyn RoleBearer> {
///         Some(self)
///     }
/// }
///
/// let account = Account { name: "alice".into(), roles: vec!["ROLE_USER".into()] };
/// let sids = IdentityResolver::new().resolve(&account);
/// assert_eq!(sids.len(), 2); // user:alice + role:ROLE_USER
/// ```
pub trait Principal {
    /// The unique name of the principal.
    fn username(&self) -> &str;

    /// The role-bearing view of the principal, if it has one.
    fn as_role_bearer(&self) -> Option<&dyn RoleBearer> {
        None
    }

    /// The group-bearing view of the principal, if it has one.
    fn as_group_bearer(&self) -> Option<&dyn GroupBearer> {
        None
    }
}

/// Hook fired after the base identity set of a principal is resolved.
///
/// Hooks run in registration order and may append identities (e.g. an
/// organization facet derived from the principal).
pub type PostResolveHook = Box<dyn Fn(&dyn Principal, &mut Vec<SecurityIdentity>)>;

/// Derives the security identity set of a principal.
///
/// The resolver always produces the user identity, then the role and group
/// identities for the capabilities the principal advertises, then lets the
/// registered hooks extend the set.
#[derive(Default)]
pub struct IdentityResolver {
    post_resolve: Vec<PostResolveHook>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("post_resolve_hooks", &self.post_resolve.len())
            .finish()
    }
}

impl IdentityResolver {
    /// Create a resolver with no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a post-resolve hook.
    pub fn on_post_resolve(
        &mut self,
        hook: impl Fn(&dyn Principal, &mut Vec<SecurityIdentity>) + 'static,
    ) {
        self.post_resolve.push(Box::new(hook));
    }

    /// Resolve the identity set of a principal.
    pub fn resolve(&self, principal: &dyn Principal) -> Vec<SecurityIdentity> {
        let mut sids = vec![SecurityIdentity::user(principal.username())];

        if let Some(roles) = principal.as_role_bearer() {
            for role in roles.roles() {
                sids.push(SecurityIdentity::role(role));
            }
        }

        if let Some(groups) = principal.as_group_bearer() {
            for group in groups.groups() {
                sids.push(SecurityIdentity::group(group));
            }
        }

        for hook in &self.post_resolve {
            hook(principal, &mut sids);
        }

        sids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PlainAccount;

    impl Principal for PlainAccount {
        fn username(&self) -> &str {
            "bob"
        }
    }

    struct FullAccount;

    impl RoleBearer for FullAccount {
        fn roles(&self) -> Vec<String> {
            vec!["ROLE_USER".to_string(), "ROLE_ADMIN".to_string()]
        }
    }

    impl GroupBearer for FullAccount {
        fn groups(&self) -> Vec<String> {
            vec!["staff".to_string()]
        }
    }

    impl Principal for FullAccount {
        fn username(&self) -> &str {
            "alice"
        }

        fn as_role_bearer(&self) -> Option<&dyn RoleBearer> {
            Some(self)
        }

        fn as_group_bearer(&self) -> Option<&dyn GroupBearer> {
            Some(self)
        }
    }

    #[test]
    fn test_resolve_without_capabilities() {
        let sids = IdentityResolver::new().resolve(&PlainAccount);

        assert_eq!(sids, vec![SecurityIdentity::user("bob")]);
    }

    #[test]
    fn test_resolve_with_capabilities() {
        let sids = IdentityResolver::new().resolve(&FullAccount);

        assert_eq!(
            sids,
            vec![
                SecurityIdentity::user("alice"),
                SecurityIdentity::role("ROLE_USER"),
                SecurityIdentity::role("ROLE_ADMIN"),
                SecurityIdentity::group("staff"),
            ]
        );
    }

    #[test]
    fn test_post_resolve_hooks_run_in_order() {
        let mut resolver = IdentityResolver::new();
        resolver.on_post_resolve(|_, sids| sids.push(SecurityIdentity::custom("first")));
        resolver.on_post_resolve(|_, sids| sids.push(SecurityIdentity::custom("second")));

        let sids = resolver.resolve(&PlainAccount);

        assert_eq!(sids[1], SecurityIdentity::custom("first"));
        assert_eq!(sids[2], SecurityIdentity::custom("second"));
    }
}
