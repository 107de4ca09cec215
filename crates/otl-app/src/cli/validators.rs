/// Whole seconds, strictly positive.
pub fn positive_secs(s: &str) -> Result<u64, String> {
    let secs: u64 = s
        .trim()
        .parse()
        .map_err(|_| format!("not a whole number of seconds: {s}"))?;
    if secs == 0 {
        return Err("must be at least 1 second".to_string());
    }
    Ok(secs)
}

/// Query text; blank input is rejected before any request is made.
pub fn non_blank_query(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        return Err("query cannot be empty".to_string());
    }
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_secs_rejects_zero_and_garbage() {
        assert_eq!(positive_secs("30"), Ok(30));
        assert!(positive_secs("0").is_err());
        assert!(positive_secs("-3").is_err());
        assert!(positive_secs("soon").is_err());
    }

    #[test]
    fn blank_queries_are_rejected() {
        assert!(non_blank_query("  \n").is_err());
        assert_eq!(non_blank_query("| head 5").unwrap(), "| head 5");
    }
}
