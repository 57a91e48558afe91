//! End-to-end tests over issue → verify → bind.

use std::collections::BTreeSet;
use std::sync::Arc;

use palisade_authz::{PrivilegesContext, TokenAuthContext, bind_from_parts};
use palisade_core::RolesConfig;
use palisade_token::{Key, TokenErrorKind, TrustTokenService};

const ROLES_YAML: &str = r#"
logs_reader:
  index_permissions:
    - index_patterns: ["logs-*"]
      allowed_actions: ["indices:data/read/*"]
snapshot_admin:
  cluster_permissions: ["cluster:admin/snapshot/*"]
"#;

const MAPPINGS_YAML: &str = r#"
background-job:
  - logs_reader
  - retired_role
"#;

fn service() -> TrustTokenService {
    let mapper = palisade_authz::ConfigRoleMapper::from_yaml(MAPPINGS_YAML).unwrap();
    let service = TrustTokenService::new(Arc::new(mapper));
    service.update_role_definitions(RolesConfig::from_yaml(ROLES_YAML).unwrap().roles);
    service.set_signing_key(Some(Key::generate_signing())).unwrap();
    service
}

#[test]
fn issue_verify_bind_round_trip() {
    let service = service();
    let token = service.issue("background-job", "svc/replication", None).unwrap();

    let verified = service.verify(&token, Some("svc/replication")).unwrap();
    assert_eq!(verified.subject, "background-job");
    assert_eq!(verified.roles, BTreeSet::from(["logs_reader".to_string()]));

    let context = TokenAuthContext::bind(&verified);
    assert_eq!(context.user().name, "background-job");
    assert!(
        context
            .action_authorization()
            .is_index_action_allowed("indices:data/read/search", "logs-2026.08")
    );
    assert!(
        !context
            .action_authorization()
            .is_cluster_action_allowed("cluster:admin/snapshot/create")
    );
    assert!(context.requires_privilege_evaluation_for_local_requests());
}

#[test]
fn bound_context_is_pinned_to_issuance_state() {
    let service = service();
    let token = service.issue("background-job", "svc/replication", None).unwrap();

    // The live configuration moves on after issuance.
    service.update_role_definitions(Default::default());

    let verified = service.verify(&token, Some("svc/replication")).unwrap();
    let context = TokenAuthContext::bind(&verified);
    assert!(
        context
            .action_authorization()
            .is_index_action_allowed("indices:data/read/search", "logs-2026.08")
    );
}

#[test]
fn audience_isolation_across_call_sites() {
    let service = service();
    let token = service.issue("background-job", "svc/a", None).unwrap();

    let err = service.verify(&token, Some("svc/b")).unwrap_err();
    assert_eq!(err.kind, TokenErrorKind::AudienceMismatch);
}

#[test]
fn rotation_keeps_old_snapshot_holders_working() {
    let old_key = Key::generate_signing();

    let rotating = service();
    rotating.set_signing_key(Some(old_key.clone())).unwrap();
    let token = rotating.issue("background-job", "svc/a", None).unwrap();

    let holdout = service();
    holdout.set_signing_key(Some(old_key)).unwrap();

    rotating.set_signing_key(Some(Key::generate_signing())).unwrap();

    assert!(holdout.verify(&token, Some("svc/a")).is_ok());
    assert_eq!(
        rotating.verify(&token, Some("svc/a")).unwrap_err().kind,
        TokenErrorKind::InvalidSignature
    );
}

#[test]
fn encrypted_issue_verify_bind() {
    let service = service();
    service.set_encryption_key(Some(Key::generate_encryption())).unwrap();

    let token = service.issue("background-job", "svc/a", None).unwrap();
    let verified = service.verify(&token, Some("svc/a")).unwrap();
    let context = TokenAuthContext::bind(&verified);
    assert!(context.mapped_roles().contains("logs_reader"));
}

#[test]
fn header_pair_entry_point() {
    let service = service();
    let token = service.issue("background-job", "svc/a", None).unwrap();

    // Both headers present: bound context.
    let bound = bind_from_parts(&service, Some(token.as_str()), Some("svc/a")).unwrap();
    assert!(bound.is_some());

    // Missing or empty headers: no token to consider.
    assert!(bind_from_parts(&service, None, Some("svc/a")).unwrap().is_none());
    assert!(bind_from_parts(&service, Some(token.as_str()), None).unwrap().is_none());
    assert!(bind_from_parts(&service, Some(""), Some("svc/a")).unwrap().is_none());

    // A present but wrong-audience token is a hard failure, not anonymous.
    let err = bind_from_parts(&service, Some(token.as_str()), Some("svc/other")).unwrap_err();
    assert_eq!(err.kind, TokenErrorKind::AudienceMismatch);

    // A tampered token is a hard failure as well.
    let mut tampered = token.clone();
    tampered.pop();
    assert!(bind_from_parts(&service, Some(tampered.as_str()), Some("svc/a")).is_err());
}
