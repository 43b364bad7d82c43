//! # CoNLL Output
//!
//! Ten tab-separated columns per token, a blank line after each sentence:
//! `ID FORM LEMMA CPOSTAG POSTAG FEATS HEAD DEPREL PHEAD PDEPREL`.

use std::io::Write;

use crate::corpus::Sentence;
use crate::decode::DependencyTree;
use crate::error::{ArcParseError, Result};
use crate::vocab::{Vocabulary, UNK_WORD};

/// Write one sentence with its predicted tree.
pub fn write_sentence<W: Write>(
    out: &mut W,
    sentence: &Sentence,
    vocab: &Vocabulary,
    tree: &DependencyTree,
) -> Result<()> {
    let content = sentence.content_len();
    if tree.len() != content {
        return Err(ArcParseError::LengthMismatch {
            gold: content,
            predicted: tree.len(),
        });
    }

    for i in 0..content {
        let form = match sentence.words[i] {
            UNK_WORD => sentence.surface[i].as_str(),
            id => vocab
                .words()
                .token(id)
                .unwrap_or(sentence.surface[i].as_str()),
        };
        let tag = vocab.pos_tags().token(sentence.pos[i]).unwrap_or("_");
        let head = match tree.heads[i] {
            h if h == tree.root() => 0,
            h => h + 1,
        };

        writeln!(
            out,
            "{}\t{}\t_\t_\t{}\t_\t{}\t{}\t_\t_",
            i + 1,
            form,
            tag,
            head,
            tree.relations[i]
        )?;
    }
    writeln!(out)?;
    Ok(())
}

/// Render one sentence to a string.
pub fn render_sentence(
    sentence: &Sentence,
    vocab: &Vocabulary,
    tree: &DependencyTree,
) -> Result<String> {
    let mut buf = Vec::new();
    write_sentence(&mut buf, sentence, vocab, tree)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
