//! Render validator trees as Zod expressions.

use crate::node::{format_number, quote};
use crate::{BASE_TOKEN, Literal, Modifier, Primitive, Validator, ValidatorKind};

/// Rendering options.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Appended to declaration names to form schema identifiers.
    pub schema_suffix: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            schema_suffix: "Schema".to_string(),
        }
    }
}

/// Helper emitted once per module when any validator carries an error
/// message. Validates with the wrapped schema and reports `message` on
/// failure.
pub const WITH_MESSAGE_HELPER: &str = "const withMessage = <T extends z.ZodTypeAny>(schema: T, message: string) =>\n  z.custom<z.infer<T>>((value) => schema.safeParse(value).success, { message });";

/// Identifier of the schema generated for a declaration.
pub fn schema_name(name: &str, options: &RenderOptions) -> String {
    format!("{}{}", name, options.schema_suffix)
}

/// Render a validator as a single-line Zod expression.
pub fn render(validator: &Validator, options: &RenderOptions) -> String {
    let mut out = render_kind(&validator.kind, options);
    for modifier in &validator.modifiers {
        out = apply_modifier(out, modifier);
    }
    out
}

fn render_kind(kind: &ValidatorKind, options: &RenderOptions) -> String {
    match kind {
        ValidatorKind::Primitive(p) => render_primitive(*p).to_string(),
        ValidatorKind::Literal(Literal::Null) => "z.null()".to_string(),
        ValidatorKind::Literal(lit) => format!("z.literal({})", lit.to_source()),
        ValidatorKind::Array(inner) => format!("z.array({})", render(inner, options)),
        ValidatorKind::Tuple(items) => format!("z.tuple([{}])", render_list(items, options)),
        ValidatorKind::Object(entries) => {
            if entries.is_empty() {
                return "z.object({})".to_string();
            }
            let body = entries
                .iter()
                .map(|e| format!("{}: {}", object_key(&e.name), render(&e.validator, options)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("z.object({{ {} }})", body)
        }
        ValidatorKind::Union(members) => format!("z.union([{}])", render_list(members, options)),
        ValidatorKind::Intersection(members) => {
            let mut iter = members.iter();
            let Some(first) = iter.next() else {
                return "z.unknown()".to_string();
            };
            iter.fold(render(first, options), |acc, next| {
                format!("z.intersection({}, {})", acc, render(next, options))
            })
        }
        ValidatorKind::Record { key, value } => {
            format!(
                "z.record({}, {})",
                render(key, options),
                render(value, options)
            )
        }
        ValidatorKind::Function { params, returns } => format!(
            "z.function().args({}).returns({})",
            render_list(params, options),
            render(returns, options)
        ),
        ValidatorKind::Ref { name, args } => render_call(name, args, options),
        ValidatorKind::Lazy { name, args } => {
            format!("z.lazy(() => {})", render_call(name, args, options))
        }
        ValidatorKind::Generic { params, body } => {
            let params = params
                .iter()
                .map(|p| format!("{}: z.ZodTypeAny = z.any()", p))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({}) => {}", params, render(body, options))
        }
        ValidatorKind::Param(name) => name.clone(),
        ValidatorKind::Expression(text) => text.clone(),
        ValidatorKind::Template { template, base } => {
            template.replace(BASE_TOKEN, &render(base, options))
        }
    }
}

fn render_primitive(p: Primitive) -> &'static str {
    match p {
        Primitive::String => "z.string()",
        Primitive::Number => "z.number()",
        Primitive::Integer => "z.number().int()",
        Primitive::Boolean => "z.boolean()",
        Primitive::BigInt => "z.bigint()",
        Primitive::Null => "z.null()",
        Primitive::Undefined => "z.undefined()",
        Primitive::Any => "z.any()",
        Primitive::Unknown => "z.unknown()",
        Primitive::Never => "z.never()",
        Primitive::Date => "z.date()",
        Primitive::Symbol => "z.symbol()",
    }
}

fn render_list(items: &[Validator], options: &RenderOptions) -> String {
    items
        .iter()
        .map(|v| render(v, options))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_call(name: &str, args: &[Validator], options: &RenderOptions) -> String {
    let schema = schema_name(name, options);
    if args.is_empty() {
        schema
    } else {
        format!("{}({})", schema, render_list(args, options))
    }
}

fn apply_modifier(expr: String, modifier: &Modifier) -> String {
    match modifier {
        Modifier::Optional => format!("{}.optional()", expr),
        Modifier::Nullable => format!("{}.nullable()", expr),
        Modifier::Readonly => format!("{}.readonly()", expr),
        Modifier::Partial => format!("{}.partial()", expr),
        Modifier::Required => format!("{}.required()", expr),
        Modifier::Pick(keys) => format!("{}.pick({})", expr, key_mask(keys)),
        Modifier::Omit(keys) => format!("{}.omit({})", expr, key_mask(keys)),
        Modifier::Bounds { min, max } => {
            let mut out = expr;
            if let Some(min) = min {
                out = format!("{}.min({})", out, format_number(*min));
            }
            if let Some(max) = max {
                out = format!("{}.max({})", out, format_number(*max));
            }
            out
        }
        Modifier::Pattern(pattern) => format!("{}.regex(new RegExp({}))", expr, quote(pattern)),
        Modifier::Message(message) => format!("withMessage({}, {})", expr, quote(message)),
    }
}

fn key_mask(keys: &[String]) -> String {
    if keys.is_empty() {
        return "{}".to_string();
    }
    let body = keys
        .iter()
        .map(|k| format!("{}: true", object_key(k)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{ {} }}", body)
}

/// Property key: bare identifier when valid, quoted otherwise.
pub fn object_key(name: &str) -> String {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if valid { name.to_string() } else { quote(name) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectEntry;

    fn entry(name: &str, validator: Validator) -> ObjectEntry {
        ObjectEntry {
            name: name.to_string(),
            validator,
        }
    }

    #[test]
    fn test_render_object() {
        let v = Validator::object(vec![
            entry("email", Validator::string()),
            entry("display-name", Validator::string().optional()),
        ]);
        insta::assert_snapshot!(
            render(&v, &RenderOptions::default()),
            @r#"z.object({ email: z.string(), "display-name": z.string().optional() })"#
        );
    }

    #[test]
    fn test_render_lazy_and_ref() {
        let options = RenderOptions::default();
        assert_eq!(
            render(&Validator::lazy("Node", vec![]), &options),
            "z.lazy(() => NodeSchema)"
        );
        assert_eq!(
            render(
                &Validator::reference("Box", vec![Validator::string()]),
                &options
            ),
            "BoxSchema(z.string())"
        );
    }

    #[test]
    fn test_render_generic() {
        let v = Validator::new(ValidatorKind::Generic {
            params: vec!["T".into()],
            body: Box::new(Validator::object(vec![entry(
                "value",
                Validator::new(ValidatorKind::Param("T".into())),
            )])),
        });
        assert_eq!(
            render(&v, &RenderOptions::default()),
            "(T: z.ZodTypeAny = z.any()) => z.object({ value: T })"
        );
    }

    #[test]
    fn test_render_modifiers_in_order() {
        let v = Validator::string()
            .with(Modifier::Bounds {
                min: Some(1.0),
                max: None,
            })
            .with_message("required")
            .optional();
        assert_eq!(
            render(&v, &RenderOptions::default()),
            "withMessage(z.string().min(1), \"required\").optional()"
        );
    }

    #[test]
    fn test_render_template_substitutes_base() {
        let v = Validator::expression("{base}.email()", Validator::string());
        assert_eq!(render(&v, &RenderOptions::default()), "z.string().email()");
    }

    #[test]
    fn test_render_intersection_folds_left() {
        let v = Validator::intersection(vec![
            Validator::reference("A", vec![]),
            Validator::reference("B", vec![]),
            Validator::reference("C", vec![]),
        ]);
        assert_eq!(
            render(&v, &RenderOptions::default()),
            "z.intersection(z.intersection(ASchema, BSchema), CSchema)"
        );
    }

    #[test]
    fn test_render_pick() {
        let v = Validator::reference("User", vec![])
            .with(Modifier::Pick(vec!["id".into(), "email".into()]));
        assert_eq!(
            render(&v, &RenderOptions::default()),
            "UserSchema.pick({ id: true, email: true })"
        );
    }
}
