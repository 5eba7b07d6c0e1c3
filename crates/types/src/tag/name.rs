//! Canonic tag expressions.
//!
//! A [`Name`] pairs a [`Uid`] with the canonic string that produced it.
//! Expressions are built by repeated [`Name::with`], which normalizes
//! separators, canonicalizes token case, and folds each token's hash into
//! the running ID. Because `.`-joined tokens combine through commutative
//! addition, any permutation of them yields the same ID:
//!
//! ```
//! use plexus_types::tag::Name;
//! let a = Name::default().with("amp.app.chat");
//! let b = Name::default().with("chat.app.amp");
//! assert_eq!(a.id, b.id);
//! assert_ne!(a.id, Name::default().with("amp-app-chat").id);
//! ```

use super::Uid;

/// The canonic commutative separator; combines terms like addition.
pub const CANONIC_WITH: char = '.';

/// The canonic non-commutative separator; order matters across it.
pub const CANONIC_THEN: char = '-';

fn is_with_separator(c: char) -> bool {
    matches!(c, '.' | '+' | ',' | '!' | '?') || c.is_whitespace()
}

fn is_then_separator(c: char) -> bool {
    matches!(c, '-' | '/' | '\\' | '~' | ':' | '^' | '@')
}

/// A canonic tag expression: the accumulated [`Uid`] plus the canonical
/// UTF-8 rendering of its terms.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Name {
    /// The accumulated identity of the expression.
    pub id: Uid,
    /// The canonical expression string: `({op}{token})*` with a leading
    /// `.` omitted.
    pub canonic: String,
}

/// Alias used where the expression reading is the natural one.
pub type Expr = Name;

impl Name {
    /// Builds a name from a single expression string.
    pub fn from_expr(expr: &str) -> Name {
        Name::default().with(expr)
    }

    /// Appends a tag expression, producing a new name.
    ///
    /// Commutative separators (`. + , space ! ?`) normalize to `.`,
    /// non-commutative ones (`- / \ ~ : ^ @`) to `-`. A token lowercases
    /// unless it is a single character or carries no lowercase letters at
    /// all (so acronyms survive). Each token hashes through
    /// [`Uid::hash_literal`] and folds in with [`Uid::with`] across `.` and
    /// [`Uid::then`] across `-`.
    pub fn with(&self, tag_expr: &str) -> Name {
        let chars: Vec<char> = tag_expr.chars().collect();
        let n = chars.len();

        let mut id = self.id;
        let mut canonic = String::with_capacity(self.canonic.len() + tag_expr.len());
        canonic.push_str(&self.canonic);

        let mut i = 0;
        while i < n {
            // extract operator: a run of separators is Then if any Then
            // separator appears in it
            let mut op = CANONIC_WITH;
            while i < n {
                let c = chars[i];
                if is_then_separator(c) {
                    op = CANONIC_THEN;
                } else if !is_with_separator(c) {
                    break;
                }
                i += 1;
            }

            // find end of tag literal
            let start = i;
            let mut lower_count = 0;
            while i < n {
                let c = chars[i];
                if is_with_separator(c) || is_then_separator(c) {
                    break;
                }
                if c.is_lowercase() {
                    lower_count += 1;
                }
                i += 1;
            }
            if i == start {
                continue; // skip empty terms
            }

            // lower-case is canonic unless the literal is a single character
            // or carries no lower-case letters
            let term: String = if i - start == 1 || lower_count > 0 {
                chars[start..i].iter().flat_map(|c| c.to_lowercase()).collect()
            } else {
                chars[start..i].iter().collect()
            };

            let term_id = Uid::hash_literal(term.as_bytes());
            id = if op == CANONIC_WITH {
                id.with(term_id)
            } else {
                id.then(term_id)
            };

            // ({tag_operator}{tag_literal})...
            if !canonic.is_empty() || op != CANONIC_WITH {
                canonic.push(op);
            }
            canonic.push_str(&term);
        }

        Name { id, canonic }
    }

    /// Splits the canonic string `n` separators from the right.
    ///
    /// E.g. `leaf_tags(2)` on `"a.b.c.d.ee"` yields `("a.b.c", "d.ee")`.
    pub fn leaf_tags(&self, mut n: usize) -> (&str, &str) {
        if n == 0 {
            return (&self.canonic, "");
        }
        let bytes = self.canonic.as_bytes();
        for p in (0..bytes.len()).rev() {
            let c = bytes[p] as char;
            if c == CANONIC_WITH || c == CANONIC_THEN {
                n -= 1;
                if n == 0 {
                    let suffix_at = if c == CANONIC_WITH { p + 1 } else { p };
                    return (&self.canonic[..p], &self.canonic[suffix_at..]);
                }
            }
        }
        ("", &self.canonic)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_normalize() {
        let name = Name::default().with("..plexus+.app.");
        assert_eq!(name.canonic, "plexus.app");
        let more = name.with("some-tag+thing");
        assert_eq!(more.canonic, "plexus.app.some-tag.thing");
        assert_eq!(
            more.id,
            name.id.with_expr("some-tag").with_token("thing")
        );
    }

    #[test]
    fn with_tokens_commute() {
        let a = Name::default().with("amp.app.chat");
        let b = Name::default().with("chat.amp.app");
        let c = Name::default().with("app chat amp");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, c.id);
    }

    #[test]
    fn then_tokens_do_not_commute() {
        let a = Name::default().with("a-b");
        let b = Name::default().with("b-a");
        assert_ne!(a.id, b.id);
        assert_eq!(a.canonic, "a-b");
        // ':' is a non-commutative separator
        assert_eq!(Name::default().with("a:b").id, a.id);
    }

    #[test]
    fn case_canonicalization() {
        // any lowercase letter pulls the token to lowercase
        assert_eq!(Name::default().with("Tag").canonic, "tag");
        // all-uppercase survives
        assert_eq!(Name::default().with("DDC").canonic, "DDC");
        // single characters lowercase
        assert_eq!(Name::default().with("X").canonic, "x");
        // a mixed-case token lowercases, so these collapse together
        assert_eq!(
            Name::default().with("a.cC.b").id,
            Name::default().with("a.cc.b").id
        );
        assert_ne!(
            Name::default().with("a.CC.b").id,
            Name::default().with("a.cc.b").id
        );
    }

    #[test]
    fn empty_terms_skipped() {
        assert_eq!(Name::default().with("...").canonic, "");
        assert!(Name::default().with("...").id.is_nil());
    }

    #[test]
    fn leaf_tags_splits_from_right() {
        let name = Name::default().with("a.b.c.d.ee");
        let (prefix, suffix) = name.leaf_tags(2);
        assert_eq!(prefix, "a.b.c");
        assert_eq!(suffix, "d.ee");

        let (prefix, suffix) = name.leaf_tags(0);
        assert_eq!(prefix, "a.b.c.d.ee");
        assert_eq!(suffix, "");

        let mixed = Name::default().with("amp.app.some-tag");
        let (prefix, suffix) = mixed.leaf_tags(1);
        assert_eq!(prefix, "amp.app.some");
        assert_eq!(suffix, "-tag");
    }
}
