// src/functions/registry.rs

use std::sync::Arc;

use super::implementations::fetch_url::FetchUrlFunction;
use super::implementations::google_search::GoogleSearchFunction;
use super::implementations::image_gen::{ImageGenFunction, ImageRepository};
use super::implementations::term_definition::{
    FetchTermDefinitionFunction, RegisterTermDefinitionFunction, TermDefinitionRepository,
};
use super::types::{ChatFunction, FunctionDefinition};
use crate::settings::Config;

/// Ordered table of the functions offered to the model.
///
/// Registration order is the order definitions are sent on the wire.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: Vec<Arc<dyn ChatFunction>>,
}

impl FunctionRegistry {
    pub fn new(functions: Vec<Arc<dyn ChatFunction>>) -> Self {
        Self { functions }
    }

    pub fn register(&mut self, function: Arc<dyn ChatFunction>) {
        self.functions.push(function);
    }

    pub fn list(&self) -> &[Arc<dyn ChatFunction>] {
        &self.functions
    }

    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        self.functions.iter().map(|f| f.definition()).collect()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn ChatFunction>> {
        self.functions.iter().find(|f| f.name() == name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Registry with every built-in function, in the order they are offered to the model.
pub fn default_registry(config: &Config, client: reqwest::Client) -> FunctionRegistry {
    let terms = Arc::new(TermDefinitionRepository::new(&config.data_directory));

    FunctionRegistry::new(vec![
        Arc::new(FetchUrlFunction::new(client.clone())),
        Arc::new(FetchTermDefinitionFunction::new(terms.clone())),
        Arc::new(RegisterTermDefinitionFunction::new(terms)),
        Arc::new(GoogleSearchFunction::new(
            client.clone(),
            config.google_search_config.clone(),
        )),
        Arc::new(ImageGenFunction::new(
            client,
            config.api_base_url.clone(),
            config.api_token().map(str::to_string),
            ImageRepository::new(&config.data_directory),
        )),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FunctionError;
    use crate::types::ChatEntry;
    use async_trait::async_trait;
    use serde_json::json;

    struct Named(&'static str);

    #[async_trait]
    impl ChatFunction for Named {
        fn definition(&self) -> FunctionDefinition {
            FunctionDefinition {
                name: self.0.to_string(),
                description: format!("{} function", self.0),
                parameters: json!({"type": "object", "properties": {}}),
            }
        }

        fn name(&self) -> &str {
            self.0
        }

        async fn invoke(&self, _: &str, _: i64) -> Result<ChatEntry, FunctionError> {
            Ok(ChatEntry::function(self.0, "ok"))
        }
    }

    fn registry() -> FunctionRegistry {
        FunctionRegistry::new(vec![
            Arc::new(Named("b_second")),
            Arc::new(Named("a_first")),
            Arc::new(Named("c_third")),
        ])
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let names: Vec<String> = registry().definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b_second", "a_first", "c_third"]);
    }

    #[test]
    fn test_get_by_name() {
        let registry = registry();
        assert_eq!(registry.get_by_name("a_first").unwrap().name(), "a_first");
        assert!(registry.get_by_name("missing").is_none());
    }

    #[test]
    fn test_default_registry_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_directory: dir.path().to_path_buf(),
            ..Config::default()
        };
        let registry = default_registry(&config, reqwest::Client::new());

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "fetch_url",
                "fetch_term_definition",
                "register_term_definition",
                "google_search",
                "image_gen"
            ]
        );
        assert!(registry.get_by_name("image_gen").unwrap().is_terminal());
        assert!(!registry.get_by_name("fetch_url").unwrap().is_terminal());
        for def in registry.definitions() {
            assert_eq!(def.parameters["type"], "object");
            assert!(def.parameters["required"].is_array());
        }
    }

    #[test]
    fn test_register_appends() {
        let mut registry = FunctionRegistry::default();
        assert!(registry.is_empty());
        registry.register(Arc::new(Named("x")));
        assert_eq!(registry.list().len(), 1);
        assert!(!registry.list()[0].is_terminal());
    }
}
