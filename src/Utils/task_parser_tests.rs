#[cfg(test)]
mod tests {
    use crate::Utils::task_parser::{
        ConfigSection, Value, filter_comments, parse_config_document, parse_document, parse_key,
        parse_key_value_pair, parse_section, parse_title, parse_value, parse_value_list,
    };

    #[test]
    fn test_parse_title_and_key() {
        let (remaining, title) = parse_title("fac_operator\n smoother_choice: additive").unwrap();
        assert_eq!(title, "fac_operator");
        assert_eq!(remaining, "smoother_choice: additive");

        let (remaining, key) = parse_key("coarse_solver_tolerance: 1e-6").unwrap();
        assert_eq!(key, "coarse_solver_tolerance");
        assert_eq!(remaining, ": 1e-6");
    }

    #[test]
    fn test_parse_typed_values() {
        assert_eq!(parse_value("10").unwrap().1, Value::Integer(10));
        assert_eq!(parse_value("1.0e-6").unwrap().1, Value::Float(1.0e-6));
        assert_eq!(parse_value("true").unwrap().1, Value::Boolean(true));
        assert_eq!(
            parse_value("CONSTANT_REFINE").unwrap().1,
            Value::String("CONSTANT_REFINE".to_string())
        );
        let (_, list) = parse_value_list("1, 2.5 ,three").unwrap();
        assert_eq!(
            list,
            vec![Value::Integer(1), Value::Float(2.5), Value::String("three".to_string())]
        );
    }

    #[test]
    fn test_parse_pair_and_section() {
        let (remaining, (key, values)) =
            parse_key_value_pair("coarse_solver_choice: sparse_lu\nnext: 1").unwrap();
        assert_eq!(key, "coarse_solver_choice");
        assert_eq!(values, vec![Value::String("sparse_lu".to_string())]);
        assert_eq!(remaining, "next: 1");

        let (_, (title, section)) =
            parse_section("fac_operator\nsmoother_choice: additive\ncoarse_solver_max_iterations: 4")
                .unwrap();
        assert_eq!(title, "fac_operator");
        assert_eq!(section.len(), 2);
        assert_eq!(section["coarse_solver_max_iterations"], vec![Value::Integer(4)]);
    }

    #[test]
    fn test_parse_document_with_comments() {
        let input = r#"
        // operator settings
        fac_operator
        smoother_choice: multiplicative
        # bottom solver
        coarse_solver_choice: krylov
        logging
        loglevel: debug
        "#;
        let filtered = filter_comments(input);
        assert!(!filtered.contains("//"));
        let doc = parse_config_document(input).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc["logging"]["loglevel"], vec![Value::String("debug".to_string())]);
        let (_, raw) = parse_document(&filtered).unwrap();
        assert_eq!(raw, doc);
    }

    #[test]
    fn test_config_section_access() {
        let doc = parse_config_document(
            "fac_operator\ncoarse_solver_tolerance: 1e-8\ncoarse_solver_max_iterations: 3\nflag: false",
        )
        .unwrap();
        let section = ConfigSection::from_document(&doc, "fac_operator").unwrap();
        assert_eq!(section.get_f64("coarse_solver_tolerance").unwrap(), Some(1e-8));
        assert_eq!(section.get_usize("coarse_solver_max_iterations").unwrap(), Some(3));
        assert_eq!(section.get_bool("flag").unwrap(), Some(false));
        assert_eq!(section.get_string("missing").unwrap(), None);
        assert!(section.get_usize("coarse_solver_tolerance").is_err());
        assert!(section.check_keys(&["coarse_solver_tolerance"]).is_err());
        assert!(ConfigSection::from_document(&doc, "other").is_err());
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse_config_document("").is_err());
        assert!(parse_config_document("fac_operator").is_err());
        assert!(parse_config_document("fac_operator\nsmoother_choice: additive\n: stray").is_err());
    }
}
