use std::io::Write;

use arcparse_core::conll::render_sentence;
use arcparse_core::{
    compute_tree, parse_sentence, ArcParseError, AttachmentScore, Choice, Corpus, Result, Scorer,
    ScoringContext, Split, Vocabulary, UNK_WORD,
};

const TRAIN: &str = "\
[][The-DT, cat-NN, sat-VBD, ROOT-ROOT]
SHIFT
[The-DT][cat-NN, sat-VBD, ROOT-ROOT]
SHIFT
[The-DT, cat-NN][sat-VBD, ROOT-ROOT]
LEFT-ARC(det)
[cat-NN][sat-VBD, ROOT-ROOT]
SHIFT
[cat-NN, sat-VBD][ROOT-ROOT]
LEFT-ARC(nsubj)
[sat-VBD][ROOT-ROOT]
SHIFT
[sat-VBD, ROOT-ROOT][]
LEFT-ARC(root)

[][Dogs-NNS, chase-VBP, cats-NNS, ROOT-ROOT]
SHIFT
SHIFT
LEFT-ARC(nsubj)
SHIFT
RIGHT-ARC(obj)
SHIFT
LEFT-ARC(root)
";

const DEV: &str = "\
[][The-DT, gryphon-NN, sat-VBD, ROOT-ROOT]
SHIFT
SHIFT
LEFT-ARC(det)
SHIFT
LEFT-ARC(nsubj)
SHIFT
LEFT-ARC(root)
";

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// Replays a fixed action list, ignoring the model inputs.
struct Replay {
    actions: Vec<u32>,
    step: usize,
}

impl Scorer for Replay {
    fn score(&mut self, ctx: &ScoringContext<'_>, _gold: Option<u32>) -> Result<Choice> {
        let action = self.actions.get(self.step).copied().unwrap_or(ctx.legal[0]);
        self.step += 1;
        Ok(Choice { action, loss: 0.0 })
    }

    fn update(&mut self) -> Result<()> {
        Ok(())
    }

    fn discard(&mut self) {}
}

#[test]
fn training_then_validation_from_files() {
    let train = write_temp(TRAIN);
    let dev = write_temp(DEV);

    let mut vocab = Vocabulary::new();
    let training = Corpus::load(train.path(), Split::Training, &mut vocab).unwrap();
    let words = vocab.count_words();

    let validation = Corpus::load(dev.path(), Split::Validation, &mut vocab).unwrap();
    assert_eq!(vocab.count_words(), words);
    assert_eq!(training.len(), 2);
    assert_eq!(validation.len(), 1);

    let sentence = validation.get(0).unwrap();
    assert_eq!(sentence.words[1], UNK_WORD);
    assert_eq!(sentence.surface[1], "gryphon");
}

#[test]
fn every_gold_sequence_is_single_rooted() {
    let mut vocab = Vocabulary::new();
    let corpus = Corpus::read_training(TRAIN.as_bytes(), &mut vocab).unwrap();

    for sentence in corpus.iter() {
        let tree = compute_tree(sentence.len(), &sentence.actions, vocab.actions()).unwrap();
        assert_eq!(tree.len(), sentence.content_len());
        assert_eq!(tree.heads.iter().filter(|&&h| h == tree.root()).count(), 1);
    }
}

#[test]
fn replaying_gold_through_a_scorer_scores_perfectly() {
    let mut vocab = Vocabulary::new();
    let _ = Corpus::read_training(TRAIN.as_bytes(), &mut vocab).unwrap();
    let dev = Corpus::read_validation(DEV.as_bytes(), &vocab).unwrap();

    let mut score = AttachmentScore::new();
    for sentence in dev.iter() {
        let mut scorer = Replay {
            actions: sentence.actions.clone(),
            step: 0,
        };
        let outcome =
            parse_sentence(&mut scorer, &sentence.words, &sentence.pos, None, vocab.actions())
                .unwrap();
        let gold = compute_tree(sentence.len(), &sentence.actions, vocab.actions()).unwrap();
        let hyp = compute_tree(sentence.len(), &outcome.actions, vocab.actions()).unwrap();
        score.add_sentence(&gold.heads, &hyp.heads).unwrap();

        let text = render_sentence(sentence, &vocab, &hyp).unwrap();
        assert!(text.starts_with("1\tThe\t_\t_\tDT\t_\t2\tdet\t_\t_\n"));
        assert!(text.contains("2\tgryphon\t"));
        assert!(text.contains("\t0\troot\t"));
    }
    assert_eq!(score.uas(), 1.0);
}

#[test]
fn malformed_corpus_file_is_fatal() {
    let file = write_temp("[][The-DT, ROOT-ROOT]\nSHIFT\nRIGHT-ARC(root)\n");
    let mut vocab = Vocabulary::new();
    let err = Corpus::load_training(file.path(), &mut vocab).unwrap_err();
    assert!(matches!(err, ArcParseError::CorruptCorpus { sentence: 0, .. }));
}
