use std::collections::HashMap;

pub fn extract_parameters(url: &str) -> HashMap<String, String> {
    let mut res = HashMap::new();
    let para_str: String = url
        .chars()
        .skip_while(|c| *c != '?')
        .skip(1)
        .take_while(|c| *c != '#')
        .collect();

    for tuple_para in para_str.split('&') {
        let kv = tuple_para.split('=').collect::<Vec<&str>>();

        if kv.len() != 2 { continue }
        res.insert(kv[0].to_string(), kv[1].to_string());
    }

    res
}

/// `@SomeUser` -> `someuser`
pub fn normalize_login(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

/// Whole-number amount typed in chat. Commas are tolerated, signs and decimals are not.
pub fn parse_amount(raw: &str) -> Option<i64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parameters() {
        let params = extract_parameters("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42#comments");
        assert_eq!(params.get("v").map(String::as_str), Some("dQw4w9WgXcQ"));
        assert_eq!(params.get("t").map(String::as_str), Some("42"));
        assert!(extract_parameters("https://youtu.be/dQw4w9WgXcQ").is_empty());
    }

    #[test]
    fn logins_and_amounts() {
        assert_eq!(normalize_login(" @CubFan "), "cubfan");
        assert_eq!(parse_amount("1,500"), Some(1500));
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("12.5"), None);
        assert_eq!(parse_amount("lots"), None);
    }
}
