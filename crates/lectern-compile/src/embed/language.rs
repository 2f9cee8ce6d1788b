//! Code-fence language from a file extension.

use std::path::Path;

/// Language tag for a file, falling back to the bare extension, then `text`.
pub fn language_for(path: &Path) -> String {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return "text".to_string();
    };
    let ext = ext.to_ascii_lowercase();

    let lang = match ext.as_str() {
        "ts" | "mts" | "cts" => "ts",
        "tsx" => "tsx",
        "js" | "mjs" | "cjs" => "js",
        "jsx" => "jsx",
        "rs" => "rust",
        "py" => "python",
        "rb" => "ruby",
        "sh" | "bash" | "zsh" => "sh",
        "yml" | "yaml" => "yaml",
        "md" => "md",
        "mdx" => "mdx",
        "htm" | "html" => "html",
        "json" | "jsonc" => "json",
        "css" | "scss" | "toml" | "sql" | "go" | "java" | "c" | "cpp" | "h" | "svelte" | "vue" => {
            ext.as_str()
        }
        "txt" => "text",
        _ => return ext,
    };
    lang.to_string()
}
