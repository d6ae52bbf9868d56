//! # castellan-contracts
//!
//! Shared types and contracts for the Castellan realm engine.
//!
//! All crates in the workspace import from here. No decision logic lives in
//! this crate: it holds the data definitions, the `Permission` capability
//! trait and the error type.

pub mod account;
pub mod error;
pub mod permission;
pub mod principal;
pub mod record;
pub mod token;

pub use account::{Account, Role};
pub use error::{RealmError, RealmResult};
pub use permission::{Permission, PermissionRequest, SharedPermission};
pub use principal::{Principal, PrincipalKind, PrincipalSet, PrincipalSetBuilder};
pub use record::{AuthenticationRecord, AuthorizationRecord, Credential};
pub use token::{AuthenticationToken, BearerToken, TokenKind, UsernamePasswordToken};

#[cfg(test)]
mod tests {
    use std::{
        collections::{hash_map::DefaultHasher, HashSet},
        fmt,
        hash::{Hash, Hasher},
        sync::Arc,
    };

    use chrono::{Duration, Utc};

    use super::*;

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    /// Exact-match permission, enough to exercise trait-object equality.
    #[derive(Debug, PartialEq, Eq, Hash)]
    struct Named(&'static str);

    impl fmt::Display for Named {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl Permission for Named {
        fn implies(&self, other: &dyn Permission) -> bool {
            other.downcast_ref::<Named>().is_some_and(|o| o == self)
        }
    }

    /// Same shape as `Named` but a different type.
    #[derive(Debug, PartialEq, Eq, Hash)]
    struct Other(&'static str);

    impl fmt::Display for Other {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl Permission for Other {
        fn implies(&self, _other: &dyn Permission) -> bool {
            false
        }
    }

    // ── PrincipalSet ─────────────────────────────────────────────────────────

    #[test]
    fn test_principal_set_preserves_realm_and_principal_order() {
        let set = PrincipalSet::builder()
            .add_principals("R1", ["a", "b"])
            .add_principal("R2", "c")
            .build();

        assert_eq!(set.primary_principal(), Some(&Principal::username("a")));
        assert_eq!(
            set.from_realm("R1"),
            &[Principal::username("a"), Principal::username("b")]
        );
        assert!(set.from_realm("R3").is_empty());
        assert_eq!(set.realm_names().collect::<Vec<_>>(), vec!["R1", "R2"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_touched_realm_without_principals_is_not_stored() {
        let set = PrincipalSet::builder()
            .with_realm("ghost")
            .add_principal("R1", "a")
            .build();

        assert_eq!(set.realm_names().collect::<Vec<_>>(), vec!["R1"]);
        assert!(set.from_realm("ghost").is_empty());

        let empty = PrincipalSet::builder().with_realm("ghost").build();
        assert!(empty.is_empty());
        assert_eq!(empty.primary_principal(), None);
        assert_eq!(empty, PrincipalSet::empty());
    }

    #[test]
    fn test_independently_built_sets_are_equal_and_hash_alike() {
        let a = PrincipalSet::builder()
            .add_principal("R1", "alice")
            .add_principal("R1", Principal::Id(7))
            .add_principal("R2", "alice")
            .build();
        // Same content, different insertion order.
        let b = PrincipalSet::builder()
            .add_principal("R2", "alice")
            .add_principal("R1", Principal::Id(7))
            .add_principal("R1", "alice")
            .build();

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let mut keys = HashSet::new();
        keys.insert(a.clone());
        assert!(keys.contains(&b));
    }

    #[test]
    fn test_realm_attribution_is_part_of_equality() {
        let a = PrincipalSet::of_principal("alice", "R1");
        let b = PrincipalSet::of_principal("alice", "R2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_duplicate_principals_within_a_realm_collapse() {
        let set = PrincipalSet::of_realm("R1", ["a", "a", "b"]);
        assert_eq!(set.from_realm("R1").len(), 2);
    }

    #[test]
    fn test_typed_lookups_scan_realms_in_order() {
        let id = uuid::Uuid::new_v4();
        let set = PrincipalSet::builder()
            .add_principal("R1", "alice")
            .add_principal("R2", Principal::Id(42))
            .add_principal("R2", Principal::Uuid(id))
            .add_principal("R3", Principal::Id(43))
            .build();

        assert_eq!(set.one_of_kind(PrincipalKind::Id), Some(&Principal::Id(42)));
        assert_eq!(
            set.all_of_kind(PrincipalKind::Id),
            vec![&Principal::Id(42), &Principal::Id(43)]
        );
        assert_eq!(set.one_of_kind(PrincipalKind::Uuid), Some(&Principal::Uuid(id)));
        assert_eq!(set.one_of_kind(PrincipalKind::Email), None);
    }

    #[test]
    fn test_available_principal_prefers_own_realm() {
        let set = PrincipalSet::builder()
            .add_principal("ldap", "uid=alice")
            .add_principal("db", Principal::Id(7))
            .build();

        assert_eq!(set.available_principal("db"), Some(&Principal::Id(7)));
        // No slice for "files": fall back to the overall primary principal.
        assert_eq!(
            set.available_principal("files"),
            Some(&Principal::username("uid=alice"))
        );
    }

    #[test]
    fn test_merge_appends_other_realms_in_order() {
        let left = PrincipalSet::of_realm("R1", ["a"]);
        let right = PrincipalSet::builder()
            .add_principal("R2", "b")
            .add_principal("R1", "c")
            .build();

        let merged = left.merge(&right);
        assert_eq!(merged.realm_names().collect::<Vec<_>>(), vec!["R1", "R2"]);
        assert_eq!(
            merged.from_realm("R1"),
            &[Principal::username("a"), Principal::username("c")]
        );
        assert_eq!(merged.primary_principal(), Some(&Principal::username("a")));
    }

    #[test]
    fn test_display_lists_distinct_principals_and_is_stable() {
        let set = PrincipalSet::builder()
            .add_principal("R1", "alice")
            .add_principal("R2", "alice")
            .add_principal("R2", Principal::Id(9))
            .build();

        assert_eq!(set.to_string(), "alice, 9");
        // Memoized: a second render returns the same text.
        assert_eq!(set.to_string(), "alice, 9");
        assert_eq!(PrincipalSet::empty().to_string(), "empty");
    }

    #[test]
    fn test_principal_set_serializes_as_realm_map() {
        let set = PrincipalSet::of_principal("alice", "corp");
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "corp": [{ "kind": "username", "value": "alice" }] })
        );
    }

    // ── Tokens ───────────────────────────────────────────────────────────────

    #[test]
    fn test_clearing_a_token_scrubs_the_password() {
        let mut token = UsernamePasswordToken::new("alice", "s3cret")
            .with_remember_me(true)
            .with_host("10.0.0.1");
        assert_eq!(token.password(), b"s3cret");

        token.clear();

        assert!(token.password().is_empty());
        assert!(token.username().is_empty());
        assert!(!token.is_remember_me());
        assert_eq!(token.host(), None);
    }

    #[test]
    fn test_token_debug_never_prints_credentials() {
        let token = AuthenticationToken::username_password("alice", "s3cret");
        let rendered = format!("{:?}", token);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("s3cret"));

        let bearer = AuthenticationToken::bearer("tok-123");
        assert!(!format!("{:?}", bearer).contains("tok-123"));
        assert_eq!(bearer.kind(), TokenKind::Bearer);
        assert_eq!(bearer.credentials(), b"tok-123");
    }

    #[test]
    fn test_token_principal_matches_shape() {
        let token = AuthenticationToken::username_password("alice", "pw");
        assert_eq!(token.principal(), Principal::username("alice"));
        assert_eq!(token.kind(), TokenKind::UsernamePassword);
    }

    // ── Records ──────────────────────────────────────────────────────────────

    #[test]
    fn test_authentication_records_merge_principals_and_credentials() {
        let mut aggregate = AuthenticationRecord::for_principal("alice", "R1", "pw1");
        let second = AuthenticationRecord::for_principal(Principal::Id(7), "R2", "pw2");
        let duplicate = AuthenticationRecord::for_principal("alice", "R3", "pw1");

        aggregate.merge(&second);
        aggregate.merge(&duplicate);
        aggregate.merge(&AuthenticationRecord::default());

        assert_eq!(
            aggregate.principals().realm_names().collect::<Vec<_>>(),
            vec!["R1", "R2", "R3"]
        );
        assert_eq!(aggregate.credentials().len(), 2);
        assert_eq!(aggregate.credential().unwrap().as_bytes(), b"pw1");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::from("hunter2");
        assert_eq!(format!("{:?}", credential), "Credential(<redacted>)");
    }

    #[test]
    fn test_authorization_record_merge_unions_everything() {
        let mut record = AuthorizationRecord::new()
            .with_role("admin")
            .with_string_permission("user:read");
        let other = AuthorizationRecord::new()
            .with_role("auditor")
            .with_role("admin")
            .with_object_permission(Arc::new(Named("printer:print")));

        record.merge(&other);

        assert_eq!(record.roles().len(), 2);
        assert!(record.has_role("auditor"));
        assert_eq!(record.string_permissions().len(), 1);
        assert_eq!(record.object_permissions().len(), 1);
        assert!(!record.is_empty());
        assert!(AuthorizationRecord::new().is_empty());
    }

    // ── Permission trait objects ─────────────────────────────────────────────

    #[test]
    fn test_permission_trait_objects_compare_structurally() {
        let a: SharedPermission = Arc::new(Named("user:read"));
        let b: SharedPermission = Arc::new(Named("user:read"));
        let c: SharedPermission = Arc::new(Named("user:write"));
        let d: SharedPermission = Arc::new(Other("user:read"));

        assert!(*a == *b);
        assert!(*a != *c);
        // Equal text, different concrete type.
        assert!(*a != *d);
        assert_eq!(hash_of(&a), hash_of(&b));

        let set: HashSet<SharedPermission> = [a, b, c, d].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_permission_downcast_reaches_concrete_type() {
        let p: SharedPermission = Arc::new(Named("x"));
        assert!(p.downcast_ref::<Named>().is_some());
        assert!(p.downcast_ref::<Other>().is_none());
    }

    #[test]
    fn test_permission_request_converts_from_text_and_objects() {
        let text: PermissionRequest = "user:read".into();
        assert!(matches!(text, PermissionRequest::Unresolved(ref s) if s == "user:read"));

        let object: PermissionRequest = (Arc::new(Named("x")) as SharedPermission).into();
        assert_eq!(object.to_string(), "x");
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    #[test]
    fn test_account_projects_into_records() {
        let account = Account::new("alice", "pw", "corp")
            .with_role("admin")
            .with_string_permission("report:read");

        let authc = account.authentication_record();
        assert_eq!(authc.principals(), &PrincipalSet::of_principal("alice", "corp"));
        assert_eq!(authc.credential().unwrap().as_bytes(), b"pw");
        assert!(account.authorization_record().has_role("admin"));
        assert_eq!(account.roles().collect::<Vec<_>>(), vec!["admin"]);
    }

    #[test]
    fn test_account_expiry_is_evaluated_against_now() {
        let past = Account::new("a", "pw", "r").with_credentials_expire_at(Utc::now() - Duration::hours(1));
        let future = Account::new("b", "pw", "r").with_credentials_expire_at(Utc::now() + Duration::hours(1));
        let never = Account::new("c", "pw", "r");

        assert!(past.is_credentials_expired());
        assert!(!future.is_credentials_expired());
        assert!(!never.is_credentials_expired());
    }

    #[test]
    fn test_account_status_travels_with_authentication_record() {
        let expiry = Utc::now() - Duration::minutes(5);
        let record = Account::new("bob", "pw", "r")
            .with_locked(true)
            .with_credentials_expire_at(expiry)
            .authentication_record();

        assert!(record.is_locked());
        assert_eq!(record.credentials_expire_at(), Some(expiry));
        assert!(record.is_credentials_expired_at(Utc::now()));
    }

    #[test]
    fn test_role_checks_its_own_permissions() {
        let role = Role::new("printer-ops").with_permission(Arc::new(Named("printer:print")));
        assert!(role.is_permitted(&Named("printer:print")));
        assert!(!role.is_permitted(&Named("printer:jam")));
    }

    // ── RealmError ───────────────────────────────────────────────────────────

    #[test]
    fn test_error_display_carries_context() {
        let err = RealmError::IncorrectCredentials {
            principal: "alice".to_string(),
        };
        assert!(err.to_string().contains("alice"));
        assert!(err.is_authentication_failure());

        let err = RealmError::DuplicateRealm {
            name: "corp".to_string(),
        };
        assert!(err.to_string().contains("duplicate realm name 'corp'"));
        assert!(err.is_configuration_error());

        let err = RealmError::Unauthorized {
            reason: "missing permission [user:delete]".to_string(),
        };
        assert!(err.is_authorization_failure());
        assert!(!err.is_authentication_failure());
    }
}
