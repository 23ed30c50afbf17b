//! Find command implementation.

use std::path::Path;

use anyhow::{Result, bail};
use ilpatch::{Code, Matcher, MethodBody, Range, find_all, format_pattern, parse_pattern};

use super::{load_bodies, lookup};

/// Run the find command
pub fn run(bodies: &Path, method: &str, pattern: &str, last: bool, all: bool) -> Result<()> {
    let runtime = load_bodies(bodies)?;
    let stored = lookup(&runtime, method)?;

    let matchers = parse_pattern(pattern)?;
    if matchers.is_empty() {
        bail!("Pattern is empty");
    }

    let code = Code::new(MethodBody::new(stored.instructions.clone()));
    let matches = find_matches(&code, &matchers, last, all)?;

    println!(
        "Searching {} ({} instructions) for [{}]",
        method,
        code.len(),
        format_pattern(&matchers)
    );
    for range in &matches {
        println!();
        println!("Match at offset {}:", range.start());
        print!("{}", range);
    }
    println!();
    println!("{} match(es)", matches.len());
    Ok(())
}

fn find_matches(code: &Code, matchers: &[Matcher], last: bool, all: bool) -> Result<Vec<Range>> {
    if all {
        let starts = find_all(&code.instructions(), matchers);
        if starts.is_empty() {
            bail!("Pattern not found: [{}]", format_pattern(matchers));
        }
        let whole = code.all();
        let matches = starts
            .into_iter()
            .map(|start| whole.sub_range(start, matchers.len()))
            .collect::<ilpatch::Result<Vec<_>>>()?;
        return Ok(matches);
    }

    let range = if last {
        code.find_last(matchers)?
    } else {
        code.find(matchers)?
    };
    Ok(vec![range])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilpatch::ins;

    fn code() -> Code {
        Code::from_instructions(vec![
            ins::ldarg(0),
            ins::ldc_r4(32.0),
            ins::ldarg(0),
            ins::ldc_r4(32.0),
            ins::ret(),
        ])
    }

    fn search(code: &Code, pattern: &str, last: bool, all: bool) -> Result<Vec<usize>> {
        let matchers = parse_pattern(pattern)?;
        let ranges = find_matches(code, &matchers, last, all)?;
        Ok(ranges.iter().map(Range::start).collect())
    }

    #[test]
    fn test_first_last_all() {
        let code = code();
        let pattern = "ldarg.0; ldc.r4 32";
        assert_eq!(search(&code, pattern, false, false).unwrap(), vec![0]);
        assert_eq!(search(&code, pattern, true, false).unwrap(), vec![2]);
        assert_eq!(search(&code, pattern, false, true).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_all_includes_overlapping_matches() {
        let code = Code::from_instructions(vec![ins::nop(), ins::nop(), ins::nop()]);
        let matchers = parse_pattern("nop; nop").unwrap();
        let ranges = find_matches(&code, &matchers, false, true).unwrap();
        let windows: Vec<_> = ranges.iter().map(|r| (r.start(), r.len())).collect();
        assert_eq!(windows, vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn test_not_found() {
        let code = code();
        let err = search(&code, "throw", false, false).unwrap_err();
        assert!(err.to_string().contains("Pattern not found"));
        assert!(search(&code, "throw", false, true).is_err());
        assert!(search(&code, "bogus", false, false).is_err());
    }
}
