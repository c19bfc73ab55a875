pub mod cache;
pub mod export;
pub mod run;

/// Splits repeated or comma separated list arguments into names.
pub fn split_names(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|item| item.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::split_names;

    #[test]
    fn names_split_on_commas_and_repeats() {
        let raw = vec!["depth, scale".to_string(), "linear_fit".to_string(), ",".to_string()];
        assert_eq!(split_names(&raw), vec!["depth", "scale", "linear_fit"]);
    }
}
