//! End-to-end generation through a `Session`.

use shapecheck::Session;
use shapecheck_config::{OverrideConfig, ShapecheckConfig};
use shapecheck_ir::{DeclarationDocument, Diagnostic};

fn document(json: &str) -> DeclarationDocument {
    DeclarationDocument::from_json_str(json).unwrap()
}

fn session_with(overrides: OverrideConfig) -> Session {
    Session::new(ShapecheckConfig {
        overrides,
        ..ShapecheckConfig::default()
    })
}

const USER: &str = r#"{"file": "src/user.ts", "declarations": [
    {"name": "User", "exported": true, "type": {"kind": "object", "fields": [
        {"name": "email", "type": {"kind": "string"}}
    ]}}
]}"#;

const CONTACT: &str = r#"{"file": "src/contact.ts", "declarations": [
    {"name": "Contact", "exported": true, "type": {"kind": "object", "fields": [
        {"name": "workEmail", "type": {"kind": "string"}},
        {"name": "email", "type": {"kind": "string"}}
    ]}}
]}"#;

#[test]
fn field_exact_rule_replaces_field_validator() {
    let mut session = session_with(OverrideConfig::default().field("email", "z.string().email()"));
    let modules = session.generate(&[document(USER)]).unwrap();

    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].path, "src/user.schema.ts");
    assert_eq!(
        modules[0].text,
        "// Generated by shapecheck. Do not edit.\n\
         import { z } from \"zod\";\n\
         \n\
         export const UserSchema = z.object({ email: z.string().email() });\n"
    );
    let user = modules[0].schema("User").unwrap();
    assert_eq!(user.source_of("email"), Some("field-exact:email"));
}

#[test]
fn field_pattern_rule_only_matches_matching_names() {
    let mut session = session_with(
        OverrideConfig::default().field_pattern("^.*Email$", "z.string().email()"),
    );
    let modules = session.generate(&[document(CONTACT)]).unwrap();
    assert!(modules[0].text.contains(
        "export const ContactSchema = z.object({ workEmail: z.string().email(), email: z.string() });"
    ));
    let contact = modules[0].schema("Contact").unwrap();
    assert_eq!(contact.source_of("workEmail"), Some("field-pattern:/^.*Email$/"));
    assert_eq!(contact.source_of("email"), Some("default"));
}

#[test]
fn context_rule_beats_field_rule() {
    let mut session = session_with(
        OverrideConfig::default()
            .context_field("User", "email", "companyEmail()")
            .field("email", "genericEmail()"),
    );
    let modules = session.generate(&[document(USER)]).unwrap();
    assert!(
        modules[0]
            .text
            .contains("export const UserSchema = z.object({ email: companyEmail() });")
    );
    assert_eq!(
        modules[0].schema("User").unwrap().source_of("email"),
        Some("context-exact:User.email")
    );
}

#[test]
fn explain_uses_the_session_rules() {
    let session = session_with(
        OverrideConfig::default()
            .context_field("User", "email", "companyEmail()")
            .field("email", "genericEmail()"),
    );
    let explanation = session.explain("email", Some("User"));
    assert_eq!(explanation.winner.to_string(), "context-exact:User.email");
    assert_eq!(explanation.candidates.iter().filter(|c| c.selected).count(), 1);
}

#[test]
fn one_module_per_file_with_imports() {
    let ids = document(
        r#"{"file": "src/ids.ts", "declarations": [
            {"name": "UserId", "exported": true, "type": {"kind": "string"}}
        ]}"#,
    );
    let account = document(
        r#"{"file": "src/account.ts", "declarations": [
            {"name": "Account", "exported": true, "type": {"kind": "object", "fields": [
                {"name": "owner", "type": {"kind": "ref", "name": "UserId"}}
            ]}}
        ]}"#,
    );
    let mut session = Session::new(ShapecheckConfig::default());
    let modules = session.generate(&[ids, account]).unwrap();

    let paths: Vec<&str> = modules.iter().map(|m| m.path.as_str()).collect();
    assert_eq!(paths, vec!["src/ids.schema.ts", "src/account.schema.ts"]);
    assert!(
        modules[1]
            .text
            .contains("import { UserIdSchema } from \"./ids.schema\";")
    );
}

#[test]
fn second_generation_is_served_from_cache() {
    let mut session = Session::new(ShapecheckConfig::default());
    let first = session.generate(&[document(CONTACT)]).unwrap();
    let second = session.generate(&[document(CONTACT)]).unwrap();

    assert_eq!(first, second);
    let stats = session.stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.generator.declarations_generated, 1);
}

#[test]
fn edited_document_is_regenerated() {
    let mut session = Session::new(ShapecheckConfig::default());
    session.generate(&[document(USER)]).unwrap();

    let edited = document(&USER.replace(r#""kind": "string""#, r#""kind": "number""#));
    let modules = session.generate(&[edited]).unwrap();
    assert!(modules[0].text.contains("z.object({ email: z.number() })"));
    assert_eq!(session.stats().cache_hits, 0);
}

const VIEW: &str = r#"{"file": "src/view.ts", "declarations": [
    {"name": "UserView", "exported": true, "type": {"kind": "mapped",
        "source": {"kind": "ref", "name": "User"},
        "transform": {"type": "per_key", "name": "Nullify", "value": {"type": "nullable"}}}}
]}"#;

#[test]
fn edit_to_a_referenced_file_regenerates_dependents() {
    let account = r#"{"file": "src/user.ts", "declarations": [
        {"name": "User", "exported": true, "type": {"kind": "object", "fields": [
            {"name": "id", "type": {"kind": "string"}}
        ]}}
    ]}"#;
    let edited = account.replace(
        r#"{"name": "id", "type": {"kind": "string"}}"#,
        r#"{"name": "id", "type": {"kind": "string"}}, {"name": "email", "type": {"kind": "string"}}"#,
    );

    let mut session = Session::new(ShapecheckConfig::default());
    session.generate(&[document(VIEW), document(account)]).unwrap();
    let cached = session.generate(&[document(VIEW), document(&edited)]).unwrap();

    let mut fresh = Session::new(ShapecheckConfig::default());
    let expected = fresh.generate(&[document(VIEW), document(&edited)]).unwrap();

    assert_eq!(cached, expected);
    let view = cached.iter().find(|m| m.file == "src/view.ts").unwrap();
    assert!(view.text.contains(
        "z.object({ id: z.string().nullable(), email: z.string().nullable() })"
    ));
    assert_eq!(session.cache().stats().invalidations, 2);
}

#[test]
fn late_declaration_replaces_unresolved_fallback() {
    let mut session = Session::new(ShapecheckConfig::default());
    let alone = session.generate(&[document(VIEW)]).unwrap();
    assert!(alone[0].text.contains("z.any()"));

    let modules = session.generate(&[document(VIEW), document(USER)]).unwrap();
    let view = modules.iter().find(|m| m.file == "src/view.ts").unwrap();
    assert!(view.text.contains("z.object({ email: z.string().nullable() })"));
    assert!(view.diagnostics().next().is_none());
}

#[test]
fn disabled_cache_always_generates() {
    let mut config = ShapecheckConfig::default();
    config.cache.enabled = false;
    let mut session = Session::new(config);
    session.generate(&[document(USER)]).unwrap();
    session.generate(&[document(USER)]).unwrap();
    assert_eq!(session.stats().generator.declarations_generated, 2);
    assert!(session.cache().is_empty());
}

#[test]
fn disabled_generation_emits_nothing() {
    let mut session = Session::new(ShapecheckConfig {
        enabled: false,
        ..ShapecheckConfig::default()
    });
    assert!(session.generate(&[document(USER)]).unwrap().is_empty());
}

#[test]
fn recursive_declarations_terminate() {
    let tree = document(
        r#"{"file": "tree.ts", "declarations": [
            {"name": "Tree", "exported": true, "type": {"kind": "object", "fields": [
                {"name": "children", "type": {"kind": "array", "element": {"kind": "ref", "name": "Tree"}}}
            ]}}
        ]}"#,
    );
    let mut session = Session::new(ShapecheckConfig::default());
    let modules = session.generate(&[tree]).unwrap();
    assert!(modules[0].text.contains("z.lazy(() => TreeSchema)"));
    assert_eq!(session.stats().generator.lazy_references, 1);
}

#[test]
fn strict_mode_reports_fallbacks_as_errors() {
    let broken = document(
        r#"{"file": "b.ts", "declarations": [
            {"name": "Broken", "exported": true, "type": {"kind": "object", "fields": [
                {"name": "thing", "type": {"kind": "ref", "name": "Nowhere"}}
            ]}}
        ]}"#,
    );
    let mut session = Session::new(ShapecheckConfig {
        strict: true,
        ..ShapecheckConfig::default()
    });
    let modules = session.generate(&[broken]).unwrap();
    assert!(modules[0].text.contains("z.object({ thing: z.any() })"));
    assert!(modules[0].diagnostics().any(Diagnostic::is_error));
}

#[test]
fn invalid_pattern_is_reported_and_ignored() {
    let mut session = session_with(
        OverrideConfig::default()
            .field_pattern("(unclosed", "broken()")
            .field("email", "z.string().email()"),
    );
    let modules = session.generate(&[document(USER)]).unwrap();
    assert!(modules[0].text.contains("email: z.string().email()"));
    assert_eq!(session.diagnostics().len(), 1);
}

#[test]
fn parallel_output_matches_synchronous_output() {
    let mut declarations = Vec::new();
    for i in 0..10 {
        declarations.push(format!(
            r#"{{"name": "Node{i}", "exported": true, "type": {{"kind": "object", "fields": [
                {{"name": "email", "type": {{"kind": "string"}}}},
                {{"name": "next", "optional": true, "type": {{"kind": "ref", "name": "Node{next}"}}}}
            ]}}}}"#,
            next = (i + 1) % 10
        ));
    }
    let json = format!(
        r#"{{"file": "nodes.ts", "declarations": [{}]}}"#,
        declarations.join(",")
    );
    let overrides = OverrideConfig::default()
        .field("email", "z.string().email()")
        .context_field("Node3", "email", "z.string()");

    let mut synchronous = session_with(overrides.clone());
    let expected = synchronous.generate(&[document(&json)]).unwrap();

    let mut config = ShapecheckConfig {
        overrides,
        ..ShapecheckConfig::default()
    };
    config.parallel.enabled = true;
    config.parallel.workers = Some(2);
    config.parallel.batch_size = 1;
    let mut parallel = Session::new(config);
    let actual = parallel.generate(&[document(&json)]).unwrap();

    assert_eq!(actual, expected);
    assert_eq!(parallel.stats().parallel_declarations, 10);
    let summary = parallel.finish();
    let shutdown = summary.shutdown.unwrap();
    assert_eq!(shutdown.cancelled, 0);
    assert_eq!(shutdown.joined, 2);
}
