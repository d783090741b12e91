//! Subject transforms: `src -> dst` wildcard templates rewriting a subject
//! crossing a leaf-link boundary.

use crate::subject::{is_wild_one, is_wild_tail, tokenize, SEPARATOR};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("src and dst wildcard counts differ: {src} vs {dst}")]
    WildcardCountMismatch { src: usize, dst: usize },
    #[error("'>' wildcard must be the last token")]
    TailNotLast,
    #[error("subject does not match transform source template")]
    NoMatch,
}

fn wildcard_count(tokens: &[&[u8]]) -> usize {
    tokens.iter().filter(|t| is_wild_one(t) || is_wild_tail(t)).count()
}

fn check_tail_position(tokens: &[&[u8]]) -> Result<(), TransformError> {
    for (i, t) in tokens.iter().enumerate() {
        if is_wild_tail(t) && i != tokens.len() - 1 {
            return Err(TransformError::TailNotLast);
        }
    }
    Ok(())
}

/// A compiled `src -> dst` subject rewrite.
pub struct SubjectTransform {
    src: Vec<Vec<u8>>,
    dst: Vec<Vec<u8>>,
}

impl SubjectTransform {
    /// Compile a transform. Fails when the wildcard counts of `src` and
    /// `dst` differ, or when either contains a non-trailing `>`.
    pub fn compile(src: &[u8], dst: &[u8]) -> Result<Self, TransformError> {
        let src_tokens = tokenize(src);
        let dst_tokens = tokenize(dst);
        check_tail_position(&src_tokens)?;
        check_tail_position(&dst_tokens)?;
        let src_wild = wildcard_count(&src_tokens);
        let dst_wild = wildcard_count(&dst_tokens);
        if src_wild != dst_wild {
            return Err(TransformError::WildcardCountMismatch { src: src_wild, dst: dst_wild });
        }
        Ok(Self {
            src: src_tokens.iter().map(|t| t.to_vec()).collect(),
            dst: dst_tokens.iter().map(|t| t.to_vec()).collect(),
        })
    }

    /// Apply the transform to a concrete subject.
    pub fn apply(&self, subject: &[u8]) -> Result<Vec<u8>, TransformError> {
        let input = tokenize(subject);
        let mut captures: Vec<Vec<u8>> = Vec::new();
        let mut si = 0;
        for (i, stok) in self.src.iter().enumerate() {
            if is_wild_tail(stok) {
                if si > input.len() {
                    return Err(TransformError::NoMatch);
                }
                let rest: Vec<u8> = input[si..].join(&SEPARATOR);
                captures.push(rest);
                si = input.len();
            } else if is_wild_one(stok) {
                if si >= input.len() {
                    return Err(TransformError::NoMatch);
                }
                captures.push(input[si].to_vec());
                si += 1;
            } else {
                if si >= input.len() || input[si] != stok.as_slice() {
                    return Err(TransformError::NoMatch);
                }
                si += 1;
            }
            let _ = i;
        }
        if si != input.len() {
            return Err(TransformError::NoMatch);
        }

        let mut capture_iter = captures.into_iter();
        let mut out_tokens: Vec<Vec<u8>> = Vec::with_capacity(self.dst.len());
        for dtok in &self.dst {
            if is_wild_one(dtok) || is_wild_tail(dtok) {
                out_tokens.push(capture_iter.next().ok_or(TransformError::NoMatch)?);
            } else {
                out_tokens.push(dtok.clone());
            }
        }
        Ok(out_tokens.join(&SEPARATOR))
    }
}
