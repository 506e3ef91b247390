//! Builder for creating OpenAPI specifications programmatically
//!
//! The builder either assembles a document by hand or translates the
//! router's route enumeration (`get_all_routes`) into path items.

use crate::spec::*;
use std::collections::HashMap;
use trellis_core::{HttpMethod, RouteInfo};

/// Builder for OpenAPI specifications
#[derive(Debug, Clone)]
pub struct OpenApiBuilder {
    spec: OpenApiSpec,
}

impl OpenApiBuilder {
    /// Create a new OpenAPI builder
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            spec: OpenApiSpec {
                openapi: "3.0.0".to_string(),
                info: Info {
                    title: title.into(),
                    version: version.into(),
                    description: None,
                    contact: None,
                    license: None,
                },
                servers: Vec::new(),
                paths: HashMap::new(),
                components: Some(Components::default()),
                tags: Vec::new(),
            },
        }
    }

    /// Set description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.spec.info.description = Some(description.into());
        self
    }

    /// Add contact information
    pub fn contact(
        mut self,
        name: Option<String>,
        url: Option<String>,
        email: Option<String>,
    ) -> Self {
        self.spec.info.contact = Some(Contact { name, url, email });
        self
    }

    /// Add license
    pub fn license(mut self, name: impl Into<String>, url: Option<String>) -> Self {
        self.spec.info.license = Some(License {
            name: name.into(),
            url,
        });
        self
    }

    /// Add a server
    pub fn server(mut self, url: impl Into<String>, description: Option<String>) -> Self {
        self.spec.servers.push(Server {
            url: url.into(),
            description,
        });
        self
    }

    /// Add a tag
    pub fn tag(mut self, name: impl Into<String>, description: Option<String>) -> Self {
        self.spec.tags.push(Tag {
            name: name.into(),
            description,
        });
        self
    }

    /// Add a path
    pub fn path(mut self, path: impl Into<String>, item: PathItem) -> Self {
        self.spec.paths.insert(path.into(), item);
        self
    }

    /// Add a schema component
    pub fn schema(mut self, name: impl Into<String>, schema: Schema) -> Self {
        if let Some(ref mut components) = self.spec.components {
            components.schemas.insert(name.into(), schema);
        }
        self
    }

    /// Add a security scheme
    pub fn security_scheme(mut self, name: impl Into<String>, scheme: SecurityScheme) -> Self {
        if let Some(ref mut components) = self.spec.components {
            components.security_schemes.insert(name.into(), scheme);
        }
        self
    }

    /// Add HTTP bearer authentication
    pub fn add_bearer_auth(self, name: impl Into<String>) -> Self {
        self.security_scheme(
            name,
            SecurityScheme::Http {
                scheme: "bearer".to_string(),
                bearer_format: Some("JWT".to_string()),
            },
        )
    }

    /// Add API key authentication
    pub fn add_api_key_auth(
        self,
        name: impl Into<String>,
        key_name: impl Into<String>,
        location: ApiKeyLocation,
    ) -> Self {
        self.security_scheme(
            name,
            SecurityScheme::ApiKey {
                name: key_name.into(),
                location,
            },
        )
    }

    /// Translate the router's route enumeration into path items.
    ///
    /// Typed placeholders such as `{id:int}` become plain `{id}` tokens
    /// with a matching path parameter schema. Entries without methods
    /// (mounted sub-applications) are skipped.
    pub fn routes(mut self, routes: &[RouteInfo]) -> Self {
        for route in routes {
            if route.methods.is_empty() {
                continue;
            }
            let (path, parameters) = translate_template(&route.path);
            let item = self.spec.paths.entry(path).or_default();
            for method in &route.methods {
                let mut operation = Operation {
                    summary: route.summary.clone(),
                    operation_id: route.name.clone(),
                    parameters: parameters.clone(),
                    ..Default::default()
                };
                operation.responses.insert(
                    "200".to_string(),
                    Response {
                        description: "Successful response".to_string(),
                        content: None,
                    },
                );
                match method {
                    HttpMethod::GET => item.get = Some(operation),
                    HttpMethod::POST => item.post = Some(operation),
                    HttpMethod::PUT => item.put = Some(operation),
                    HttpMethod::DELETE => item.delete = Some(operation),
                    HttpMethod::PATCH => item.patch = Some(operation),
                    // HEAD and OPTIONS are not represented in path items.
                    HttpMethod::HEAD | HttpMethod::OPTIONS => {}
                }
            }
        }
        self
    }

    /// Build the OpenAPI specification
    pub fn build(self) -> OpenApiSpec {
        self.spec
    }
}

/// Convert a route template to an OpenAPI path plus its path parameters.
fn translate_template(template: &str) -> (String, Vec<Parameter>) {
    let mut path = String::with_capacity(template.len());
    let mut parameters = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        path.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            path.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let token = &after[..close];
        let (name, tag) = match token.split_once(':') {
            Some((n, t)) => (n, t),
            None => (token, "str"),
        };
        path.push('{');
        path.push_str(name);
        path.push('}');
        parameters.push(Parameter {
            name: name.to_string(),
            location: ParameterLocation::Path,
            description: None,
            required: Some(true),
            schema: Some(schema_for_tag(tag)),
        });
        rest = &after[close + 1..];
    }
    path.push_str(rest);
    (path, parameters)
}

fn schema_for_tag(tag: &str) -> Schema {
    match tag {
        "int" => Schema::integer(),
        "float" => Schema::number(),
        "uuid" => Schema::uuid(),
        _ => Schema::string(),
    }
}
