use entropic_sketchbook::sketch_id_for_create;
use once_cell::sync::Lazy;
use regex::Regex;

static IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*import[ \t]+[^\n]*;[ \t]*$").expect("import regex"));
static VOID_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)void[ \t]+").expect("void regex"));
static HAS_SETUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"void\s+setup\s*\(").expect("setup regex"));
static HAS_DRAW: Lazy<Regex> = Lazy::new(|| Regex::new(r"void\s+draw\s*\(").expect("draw regex"));
static HAS_SETTINGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"void\s+settings\s*\(").expect("settings regex"));

const CORE_IMPORTS: &str = "import processing.core.*;
import processing.data.*;
import processing.event.*;
import processing.opengl.*;
";

/// Java class name for a sketch, using the sketchbook's naming rules.
pub fn class_name_for(sketch_name: &str) -> String {
    sketch_id_for_create(sketch_name)
}

/// Turns `.pde` source into a `PApplet` subclass named `class_name`.
///
/// Imports are hoisted above the class, top-level `void` methods become
/// `public`, and missing `settings()`, `setup()` and `draw()` are synthesized.
pub fn wrap_sketch(code: &str, class_name: &str) -> String {
    let code = code.replace("\r\n", "\n");
    let imports: Vec<&str> = IMPORT_LINE
        .find_iter(&code)
        .map(|m| m.as_str().trim())
        .collect();
    let body = IMPORT_LINE.replace_all(&code, "");
    let has_setup = HAS_SETUP.is_match(&body);
    let has_draw = HAS_DRAW.is_match(&body);
    let has_settings = HAS_SETTINGS.is_match(&body);
    let body = VOID_LINE.replace_all(&body, "${1}public void ");

    let mut java = String::with_capacity(code.len() + 512);
    java.push_str(CORE_IMPORTS);
    for import in &imports {
        java.push_str(import);
        java.push('\n');
    }
    java.push('\n');
    java.push_str(&format!("public class {class_name} extends PApplet {{\n"));
    for line in body.split('\n') {
        if !line.trim().is_empty() {
            java.push_str("  ");
            java.push_str(line);
        }
        java.push('\n');
    }

    // Processing 4 only honours size() inside settings().
    if !has_settings {
        java.push_str("\n  public void settings() {\n    size(800, 600);\n  }\n");
    }
    if !has_setup {
        java.push_str("\n  public void setup() {\n  }\n");
    }
    if !has_draw {
        java.push_str("\n  public void draw() {\n  }\n");
    }
    java.push_str(&format!(
        "\n  public static void main(String[] args) {{\n    PApplet.main(\"{class_name}\");\n  }}\n}}\n"
    ));
    java
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn imports_are_hoisted_and_voids_made_public() {
        let code = "import processing.sound.*;\n\nvoid setup() {\n  size(200, 200);\n}\n\n  void mousePressed() {}\n";
        let java = wrap_sketch(code, "Waves");

        let class_at = java.find("public class Waves extends PApplet {").expect("class");
        let import_at = java.find("import processing.sound.*;").expect("import");
        assert!(import_at < class_at);
        assert_eq!(java.matches("import processing.sound.*;").count(), 1);
        assert!(java.contains("  public void setup() {\n"));
        assert!(java.contains("    public void mousePressed() {}"));
        assert!(java.contains("PApplet.main(\"Waves\");"));
    }

    #[test]
    fn missing_entry_points_are_synthesized() {
        let java = wrap_sketch("void draw() { background(0); }\n", "Dots");
        assert!(java.contains("public void settings() {\n    size(800, 600);\n  }"));
        assert!(java.contains("public void setup() {\n  }"));
        assert_eq!(java.matches("public void draw()").count(), 1);
    }

    #[test]
    fn existing_settings_are_kept_as_is() {
        let code = "void settings() { size(100, 100); }\nvoid setup() {}\nvoid draw() {}\n";
        let java = wrap_sketch(code, "Tiny");
        assert_eq!(java.matches("size(").count(), 1);
        assert_eq!(java.matches("public void setup()").count(), 1);
    }

    #[test]
    fn windows_line_endings_are_normalized() {
        let java = wrap_sketch("import a.b.*;\r\nvoid setup() {}\r\n", "Crlf");
        assert!(!java.contains('\r'));
        assert!(java.contains("import a.b.*;\n"));
    }

    #[test]
    fn class_names_follow_sketch_naming() {
        assert_eq!(class_name_for("1 Test"), "S_1_Test");
        assert_eq!(class_name_for(""), "Untitled");
    }
}
