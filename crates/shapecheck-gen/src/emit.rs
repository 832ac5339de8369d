//! Emit generated schemas as a TypeScript module.
//!
//! One module per source file. Declarations are ordered so that every
//! eager reference points at a schema defined earlier in the module;
//! schemas from other files are imported from their sibling modules.

use indexmap::IndexMap;
use shapecheck_ir::{
    GeneratedSchema, RenderOptions, TypeArena, ValidatorKind, WITH_MESSAGE_HELPER, object_key,
    render, schema_name,
};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

const HEADER: &str = "// Generated by shapecheck. Do not edit.";

/// Output path of the module generated for `file`: `src/user.ts` becomes
/// `src/user.schema.ts`.
pub fn module_path(file: &str) -> String {
    format!("{}.schema.ts", strip_extension(file))
}

/// Import specifier for the module of `to`, relative to the module of
/// `from`.
pub fn module_specifier(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = directory(from);
    let to_dir: Vec<&str> = directory(to);
    let to_name = to.rsplit('/').next().unwrap_or(to);

    let common = from_dir
        .iter()
        .zip(&to_dir)
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<String> = vec!["..".to_string(); from_dir.len() - common];
    parts.extend(to_dir[common..].iter().map(|s| s.to_string()));
    parts.push(format!("{}.schema", strip_extension(to_name)));

    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{}", joined)
    }
}

fn directory(file: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = file
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    parts.pop();
    parts
}

fn strip_extension(file: &str) -> &str {
    let name_start = file.rfind('/').map(|i| i + 1).unwrap_or(0);
    match file[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &file[..name_start + dot],
        _ => file,
    }
}

/// Render the schemas of `file` as one module.
pub fn emit_module(
    file: &str,
    schemas: &[GeneratedSchema],
    arena: &TypeArena,
    options: &RenderOptions,
) -> String {
    let local: HashSet<_> = schemas.iter().map(|s| s.id).collect();

    let mut imports: IndexMap<String, Vec<String>> = IndexMap::new();
    for schema in schemas {
        for dep in &schema.dependencies {
            if local.contains(dep) {
                continue;
            }
            let Some(decl) = arena.declaration(*dep) else {
                continue;
            };
            let name = schema_name(&decl.name, options);
            let names = imports
                .entry(module_specifier(file, &decl.file))
                .or_default();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let needs_helper = schemas.iter().any(|s| {
        s.validator.has_message()
            || s
                .members
                .iter()
                .any(|m| m.params.has_message() || m.returns.has_message())
    });

    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    out.push_str("import { z } from \"zod\";\n");
    for (module, names) in &imports {
        let _ = writeln!(out, "import {{ {} }} from \"{}\";", names.join(", "), module);
    }
    if needs_helper {
        out.push('\n');
        out.push_str(WITH_MESSAGE_HELPER);
        out.push('\n');
    }

    for index in dependency_order(schemas) {
        let schema = &schemas[index];
        let export = if schema.exported { "export " } else { "" };
        // recursive consts need an explicit type
        let annotation = if schema.validator.has_lazy()
            && !matches!(schema.validator.kind, ValidatorKind::Generic { .. })
        {
            ": z.ZodTypeAny"
        } else {
            ""
        };
        out.push('\n');
        let _ = writeln!(
            out,
            "{}const {}{} = {};",
            export,
            schema_name(&schema.name, options),
            annotation,
            render(&schema.validator, options)
        );

        if !schema.members.is_empty() {
            let _ = writeln!(out, "{}const {}Members = {{", export, schema.name);
            for member in &schema.members {
                let _ = writeln!(
                    out,
                    "  {}: {{ args: {}, returns: {} }},",
                    object_key(&member.member),
                    render(&member.params, options),
                    render(&member.returns, options)
                );
            }
            out.push_str("};\n");
        }
    }
    out
}

/// Indices of `schemas`, dependencies first, otherwise in input order.
fn dependency_order(schemas: &[GeneratedSchema]) -> Vec<usize> {
    let by_name: HashMap<&str, usize> = schemas
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), i))
        .collect();
    let deps: Vec<Vec<usize>> = schemas
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut names = s.validator.eager_refs();
            for member in &s.members {
                names.extend(member.params.eager_refs());
                names.extend(member.returns.eager_refs());
            }
            names
                .iter()
                .filter_map(|n| by_name.get(n.as_str()).copied())
                .filter(|&d| d != i)
                .collect()
        })
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn visit(i: usize, deps: &[Vec<usize>], marks: &mut [Mark], order: &mut Vec<usize>) {
        if marks[i] != Mark::New {
            return;
        }
        marks[i] = Mark::Active;
        for &d in &deps[i] {
            visit(d, deps, marks, order);
        }
        marks[i] = Mark::Done;
        order.push(i);
    }

    let mut marks = vec![Mark::New; schemas.len()];
    let mut order = Vec::with_capacity(schemas.len());
    for i in 0..schemas.len() {
        visit(i, &deps, &mut marks, &mut order);
    }
    order
}
