//! Newick reading and writing.
//!
//! The format is `(child,child,...)support:length;` where internal labels
//! are support strings, leaf labels are taxa, and both the label and the
//! `:length` suffix are optional. The writer is the round-trip oracle: a
//! tree parsed from a Newick string serializes back byte-identically.

use crate::tree::{Clade, CladeId, Tree};
use thiserror::Error;

/// How many bytes of surrounding input an error message carries.
const ERROR_CONTEXT_LENGTH: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NewickError {
    #[error("unexpected byte {byte:?} at {position} (near {context:?})")]
    UnexpectedByte {
        byte: char,
        position: usize,
        context: String,
    },
    #[error("unexpected end of input at {position}")]
    UnexpectedEnd { position: usize },
    #[error("invalid branch length {text:?} at {position}")]
    InvalidLength { text: String, position: usize },
    #[error("trailing input after ';' at {position}")]
    TrailingInput { position: usize },
}

pub fn parse_newick(input: &str) -> Result<Tree, NewickError> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let mut tree = Tree::new(Clade::new());
    let root = tree.root();
    parser.node(&mut tree, root)?;
    parser.expect(b';')?;
    parser.skip_whitespace();
    if parser.pos < parser.bytes.len() {
        return Err(NewickError::TrailingInput { position: parser.pos });
    }
    Ok(tree)
}

pub fn write_newick(tree: &Tree) -> String {
    // "(,)" per internal node, label bytes per leaf, ~8 bytes per length.
    let mut out = String::with_capacity(tree.clades().count() * 12);
    write_clade(tree, tree.root(), &mut out);
    out.push(';');
    out
}

fn write_clade(tree: &Tree, id: CladeId, out: &mut String) {
    let clade = &tree[id];
    if clade.is_leaf() {
        if let Some(taxon) = &clade.taxon {
            out.push_str(taxon);
        }
    } else {
        out.push('(');
        for (i, &child) in clade.children().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_clade(tree, child, out);
        }
        out.push(')');
        if let Some(supports) = &clade.supports {
            out.push_str(supports);
        }
    }
    if let Some(length) = clade.length {
        out.push(':');
        out.push_str(&length.to_string());
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn node(&mut self, tree: &mut Tree, id: CladeId) -> Result<(), NewickError> {
        self.skip_whitespace();
        if self.peek() == Some(b'(') {
            self.pos += 1;
            loop {
                let child = tree
                    .attach(id, Clade::new())
                    .expect("parser attaches below a live node");
                self.node(tree, child)?;
                match self.peek() {
                    Some(b',') => {
                        self.pos += 1;
                    }
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    Some(other) => return Err(self.unexpected(other)),
                    None => return Err(NewickError::UnexpectedEnd { position: self.pos }),
                }
            }
            let label = self.label();
            if !label.is_empty() {
                tree[id].supports = Some(label);
            }
        } else {
            let label = self.label();
            if !label.is_empty() {
                tree[id].taxon = Some(label);
            }
        }
        if self.peek() == Some(b':') {
            self.pos += 1;
            tree[id].length = Some(self.length()?);
        }
        Ok(())
    }

    fn label(&mut self) -> String {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if matches!(byte, b'(' | b')' | b',' | b':' | b';') || byte.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn length(&mut self) -> Result<f64, NewickError> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if matches!(byte, b'+' | b'-' | b'.' | b'e' | b'E') || byte.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        text.parse().map_err(|_| NewickError::InvalidLength {
            text,
            position: start,
        })
    }

    fn expect(&mut self, byte: u8) -> Result<(), NewickError> {
        self.skip_whitespace();
        match self.peek() {
            Some(found) if found == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(self.unexpected(found)),
            None => Err(NewickError::UnexpectedEnd { position: self.pos }),
        }
    }

    fn unexpected(&self, byte: u8) -> NewickError {
        let end = (self.pos + ERROR_CONTEXT_LENGTH).min(self.bytes.len());
        let start = self.pos.saturating_sub(ERROR_CONTEXT_LENGTH / 2);
        NewickError::UnexpectedByte {
            byte: byte as char,
            position: self.pos,
            context: String::from_utf8_lossy(&self.bytes[start..end]).into_owned(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_supports_and_lengths() {
        let tree = parse_newick("((A:1,B:2)85/95:0.5,C:3);").unwrap();
        let root = tree.root();
        assert_eq!(tree[root].children().len(), 2);
        let inner = tree[root].children()[0];
        assert_eq!(tree[inner].supports.as_deref(), Some("85/95"));
        assert_eq!(tree[inner].length, Some(0.5));
        let a = tree[inner].children()[0];
        assert_eq!(tree[a].taxon.as_deref(), Some("A"));
        assert_eq!(tree[a].length, Some(1.0));
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let err = parse_newick("(A,B)").unwrap_err();
        assert!(matches!(err, NewickError::UnexpectedEnd { .. }));
    }

    #[test]
    fn bad_length_is_reported_with_position() {
        let err = parse_newick("(A:x,B);").unwrap_err();
        assert_eq!(
            err,
            NewickError::InvalidLength {
                text: String::new(),
                position: 3
            }
        );
    }

    #[test]
    fn trailing_garbage_is_reported() {
        let err = parse_newick("(A,B); extra").unwrap_err();
        assert!(matches!(err, NewickError::TrailingInput { .. }));
    }

    #[test]
    fn writer_reproduces_input() {
        let input = "((A:1,B:2)85/95:0.5,C:3);";
        let tree = parse_newick(input).unwrap();
        assert_eq!(write_newick(&tree), input);
    }
}
