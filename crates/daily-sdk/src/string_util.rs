/// String helpers for environment flags and message templates.
pub struct StringUtil;

impl StringUtil {
    /// Convert a string to a boolean.
    ///
    /// Valid true values: `"1"`, `"true"`, `"yes"` (case-insensitive).
    /// Valid false values: `"0"`, `"false"`, `"no"` (case-insensitive).
    /// Returns `None` for unrecognized values.
    pub fn convert_to_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        }
    }

    /// Replace every `{name}` in `template` with its value from `vars`.
    /// Unknown placeholders are left as they are.
    pub fn expand_placeholders(template: &str, vars: &[(&str, &str)]) -> String {
        let mut result = template.to_string();
        for (name, value) in vars {
            result = result.replace(&format!("{{{name}}}"), value);
        }
        result
    }
}
