/// Replace `${ENV_VAR}` and `${ENV_VAR:-fallback}` placeholders in raw config text.
///
/// Unresolvable variables without a fallback are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Same as [`substitute_env`] with a custom lookup, so tests never touch the
/// process environment.
fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            // Unterminated placeholder, emit the remainder literally.
            result.push_str(&rest[start..]);
            return result;
        };

        let inner = &after[..end];
        let (name, fallback) = match inner.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (inner, None),
        };

        match (name.is_empty(), lookup(name), fallback) {
            (false, Some(value), _) => result.push_str(&value),
            (false, None, Some(fallback)) => result.push_str(fallback),
            _ => {
                result.push_str("${");
                result.push_str(inner);
                result.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "OBSERVER_DB_PASSWORD" => Some("hunter2".to_string()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("password = \"${OBSERVER_DB_PASSWORD}\"", lookup),
            "password = \"hunter2\""
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env_with("${OBSERVER_NONEXISTENT_XYZ}", lookup),
            "${OBSERVER_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn uses_fallback_when_unset() {
        assert_eq!(
            substitute_env_with("bucket = \"${OBSERVER_BUCKET:-archive}\"", lookup),
            "bucket = \"archive\""
        );
        assert_eq!(
            substitute_env_with("${OBSERVER_DB_PASSWORD:-nope}", lookup),
            "hunter2"
        );
    }

    #[test]
    fn unterminated_is_literal() {
        assert_eq!(substitute_env_with("a ${OPEN", lookup), "a ${OPEN");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
