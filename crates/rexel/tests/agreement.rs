//! Cross-executor agreement: for patterns both engines can run, the
//! parallel and backtracking matchers must report the same start and
//! length on the same input.

use rexel::{BacktrackMatcher, ParallelMatcher, Rexel};

const PATTERNS: &[&str] = &[
    "a",
    "abc",
    "a|b",
    "a|ab|abc",
    "ab|cd",
    "a*",
    "a+",
    "a?b",
    "a*b",
    "a+b+",
    "a*?b",
    "(ab)+",
    "(a|b)*c",
    "(a|b)+",
    "a{2}",
    "a{2,}",
    "a{1,3}b",
    "[abc]+",
    "[a-f]+[0-9]*",
    "[^a-c]+",
    "x[0-9]{2,4}y",
    ".",
    ".*b",
    "a.c",
    "^a",
    "b$",
    "^abc$",
    r"\ba\b",
    r"\<ab",
    r"ab\>",
    r"\Aa",
    r"b\z",
    r"\w+",
    r"\d+",
    r"\s+",
    "(?i:abc)",
    "(?i:a)b",
    "(?s:a.c)",
    "(a)(b)(c)",
    "(a(b(c)))",
    "a(bc)*d",
    "(|a)b",
    "(a*)*b",
];

const INPUTS: &[&str] = &[
    "",
    "a",
    "b",
    "ab",
    "abc",
    "aab",
    "aaab",
    "abcabc",
    "xaby",
    "cdcd",
    "a c",
    "  ab  ",
    "x123y",
    "x12345y",
    "ABC",
    "aBc",
    "a\nb",
    "b\na",
    "abc\nabc",
    "zzzz",
    "a1b2c3",
    "the cat sat",
    "d",
    "bcd",
    "acbacb",
];

fn parallel_result(rx: &Rexel, input: &str) -> Option<(u64, u32)> {
    let mut m = ParallelMatcher::new(rx, false).expect("no backrefs in corpus");
    m.match_str(input).map(|p| (p.start, p.len))
}

fn backtrack_result(rx: &Rexel, input: &str) -> Option<(u64, u32)> {
    let chars: Vec<char> = input.chars().collect();
    BacktrackMatcher::new(rx)
        .search(&chars, 0, None)
        .map(|(at, m)| (at as u64, m.len))
}

#[test]
fn executors_agree_on_start_and_length() {
    let mut checked = 0usize;
    for pattern in PATTERNS {
        let rx = Rexel::compile(pattern).unwrap_or_else(|e| panic!("{pattern}: {e}"));
        for input in INPUTS {
            let p = parallel_result(&rx, input);
            let b = backtrack_result(&rx, input);
            assert_eq!(
                p, b,
                "parallel vs backtrack disagree for {pattern:?} on {input:?}"
            );
            checked += 1;
        }
    }
    assert_eq!(checked, PATTERNS.len() * INPUTS.len());
}

#[test]
fn executors_agree_with_point_flag() {
    let rx = Rexel::compile(r"ab\@cd").unwrap();
    let input: Vec<char> = "xabcdy".chars().collect();
    let b = BacktrackMatcher::new(&rx).search(&input, 0, Some(3));
    assert_eq!(b.map(|(at, m)| (at, m.len)), Some((1, 4)));
    let mut m = ParallelMatcher::new(&rx, false).unwrap();
    for (i, &c) in input.iter().enumerate() {
        m.step(Some(c), rexel::flags_at(&input, i, Some(3)));
    }
    let r = m.step(None, rexel::flags_at(&input, input.len(), Some(3)));
    assert_eq!(r.found.map(|p| (p.start, p.len)), Some((1, 4)));
}
