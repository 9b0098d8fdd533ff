//! Test name escaping for the results service.
//!
//! The service treats `\` in a test run name as a hierarchy separator, so
//! `Namespace.Class.Method` should become `Namespace\Class\Method` to show
//! up as a tree. Dots inside a parameter list are content, not structure:
//!
//! | TRX test name | Uploaded name |
//! |---------------|---------------|
//! | `A.B.C` | `A\B\C` |
//! | `Foo(1.5)` | `Foo\(1.5)` |
//! | `A\B` | `A&#92;B` |

/// Escape sequence written for a literal backslash in a test name.
pub const BACKSLASH_ESCAPE: &str = "&#92;";

/// Convert a TRX test name into a test run name for upload.
///
/// Once the first `(` has been seen every following `.` is kept as-is,
/// even after the matching `)`.
pub fn sanitize_test_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    let mut inside_params = false;

    for c in name.chars() {
        match c {
            '(' => {
                out.push_str("\\(");
                inside_params = true;
            }
            '\\' => out.push_str(BACKSLASH_ESCAPE),
            '.' if !inside_params => out.push('\\'),
            _ => out.push(c),
        }
    }

    out
}
