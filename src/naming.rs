use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WORD_SEPARATOR: Regex = Regex::new(r"[^\p{Alphabetic}\p{Nd}]+").unwrap();
}

/// Normalizes a method name to UpperCamelCase.
///
/// Words are delimited by any run of characters that are neither letters nor
/// digits, so `create-resource`, `create_resource` and `create resource` all
/// become `CreateResource`. Case inside a word is preserved, which keeps
/// `createResource` and `CreateResource` equivalent.
pub fn to_camel(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for word in WORD_SEPARATOR.split(name) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(chars.as_str());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("create-resource" => "CreateResource" ; "kebab")]
    #[test_case("create_resource" => "CreateResource" ; "snake")]
    #[test_case("create resource" => "CreateResource" ; "spaced")]
    #[test_case("createResource" => "CreateResource" ; "lower camel")]
    #[test_case("CreateResource" => "CreateResource" ; "already canonical")]
    #[test_case("get" => "Get" ; "single word")]
    #[test_case("--get--" => "Get" ; "surrounding separators")]
    #[test_case("v2-list" => "V2List" ; "digits")]
    #[test_case("" => "" ; "empty")]
    fn camel_case(name: &str) -> String {
        to_camel(name)
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(name in "[a-zA-Z0-9 _.-]{0,24}") {
            let once = to_camel(&name);
            prop_assert_eq!(once.clone(), to_camel(&once));
        }

        #[test]
        fn output_has_no_separators(name in "[a-zA-Z0-9 _.:/#-]{0,24}") {
            let camel = to_camel(&name);
            prop_assert!(camel.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }
}
