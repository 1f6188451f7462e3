//! Digit-aware ordering for picture names ("p2" before "p10").

/// Stable sort using natural order: digit runs compare numerically.
pub fn sort_natural(mut names: Vec<String>) -> Vec<String> {
    names.sort_by(|a, b| natord::compare(a, b));
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_runs_compare_numerically() {
        let names = ["p10.png", "p2.png", "p1.png", "cover.png"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            sort_natural(names),
            vec!["cover.png", "p1.png", "p2.png", "p10.png"]
        );
    }
}
