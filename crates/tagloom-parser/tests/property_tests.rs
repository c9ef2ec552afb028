//! Property tests: resolution of arbitrary candidates terminates, is
//! deterministic and never loses or duplicates input text.

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use tagloom_parser::{Candidate, Pass, Resolution, resolve};
use tagloom_rules::{RootDeclaration, RuleFlags, RuleTable, RuleTableBuilder, TagDeclaration};

const NAMES: [&str; 6] = ["B", "I", "LIST", "LI", "DIV", "NOPE"];
const ALPHABET: [char; 6] = ['a', 'b', ' ', '\n', '[', ']'];

#[derive(Debug, Clone)]
struct Input {
    text: String,
    candidates: Vec<Candidate>,
}

fn below(g: &mut Gen, bound: usize) -> usize {
    usize::arbitrary(g) % (bound + 1)
}

fn arbitrary_candidate(g: &mut Gen, text_len: usize) -> Candidate {
    let pos = below(g, text_len);
    let len = below(g, (text_len - pos).min(4));
    let name = *g.choose(&NAMES).unwrap_or(&"B");

    match below(g, 7) {
        0 => Candidate::end(name, pos, len),
        1 => Candidate::self_closing(name, pos, len),
        2 => Candidate::line_break(pos, len),
        3 => Candidate::ignore(pos, len),
        4 => Candidate::paragraph_break(pos),
        5 => {
            let end_pos = pos + len + below(g, text_len - pos - len);
            let end_len = below(g, (text_len - end_pos).min(4));
            Candidate::start(name, pos, len).with_end(end_pos, end_len)
        }
        _ => Candidate::start(name, pos, len).with_sort_priority(i32::arbitrary(g) % 3),
    }
}

impl Arbitrary for Input {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = below(g, 40);
        let text: String = (0..len)
            .map(|_| *g.choose(&ALPHABET).unwrap_or(&'a'))
            .collect();
        let count = below(g, 16);
        let candidates = (0..count)
            .map(|_| arbitrary_candidate(g, text.len()))
            .collect();
        Self { text, candidates }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let input = self.clone();
        Box::new((0..self.candidates.len()).map(move |skip| {
            let mut smaller = input.clone();
            let _ = smaller.candidates.remove(skip);
            smaller
        }))
    }
}

fn rules() -> RuleTable {
    RuleTableBuilder::new()
        .root(
            RootDeclaration::new().flags(RuleFlags::CREATE_PARAGRAPHS | RuleFlags::ENABLE_AUTO_BR),
        )
        .tag(TagDeclaration::new("B").flags(RuleFlags::AUTO_REOPEN))
        .tag(TagDeclaration::new("I").nesting_limit(2).tag_limit(5))
        .tag(
            TagDeclaration::new("LIST")
                .flags(RuleFlags::BREAK_PARAGRAPH | RuleFlags::TRIM_FIRST_LINE)
                .create_child(["LI"]),
        )
        .tag(
            TagDeclaration::new("LI")
                .flags(RuleFlags::IGNORE_SURROUNDING_WHITESPACE | RuleFlags::AUTO_CLOSE)
                .require_parent("LIST")
                .close_parent(["LI"]),
        )
        .tag(
            TagDeclaration::new("DIV")
                .flags(RuleFlags::IGNORE_TAGS | RuleFlags::CREATE_PARAGRAPHS)
                .foster_parent(["B"])
                .close_ancestor(["I"]),
        )
        .build()
        .unwrap()
}

fn run(input: &Input) -> Resolution {
    resolve(
        &input.text,
        [Pass::new("random", input.candidates.clone())],
        &rules(),
    )
    .unwrap()
}

#[quickcheck]
fn prop_text_is_conserved(input: Input) -> bool {
    run(&input).document.source_text() == input.text
}

#[quickcheck]
fn prop_resolution_is_deterministic(input: Input) -> bool {
    let first = run(&input);
    let second = run(&input);
    first.document.to_xml() == second.document.to_xml() && first.log == second.log
}

#[quickcheck]
fn prop_nesting_limit_holds(input: Input) -> bool {
    let document = run(&input).document;
    document.find_elements("I").into_iter().all(|id| {
        let tree = document.tree();
        let nested = tree
            .ancestors(id)
            .filter(|&ancestor| {
                tree.as_element(ancestor)
                    .is_some_and(|element| element.name == "I")
            })
            .count();
        nested < 2
    })
}

#[quickcheck]
fn prop_tag_limit_holds(input: Input) -> bool {
    run(&input).document.find_elements("I").len() <= 5
}
