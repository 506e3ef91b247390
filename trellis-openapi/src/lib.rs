//! OpenAPI 3.0 specification generation for Trellis
//!
//! Builds typed OpenAPI documents, either programmatically or from the
//! router's route enumeration, and serves them through Swagger UI.
//!
//! ## Quick Start
//!
//! ```
//! use trellis_openapi::OpenApiBuilder;
//!
//! let spec = OpenApiBuilder::new("My API", "1.0.0")
//!     .description("A wonderful API")
//!     .server("http://localhost:3000", None)
//!     .build();
//!
//! assert_eq!(spec.info.title, "My API");
//! assert_eq!(spec.servers.len(), 1);
//! ```
//!
//! ## From registered routes
//!
//! ```
//! use trellis_core::{Application, HttpResponse, Route};
//! use trellis_openapi::OpenApiBuilder;
//!
//! let mut app = Application::new();
//! app.add_route(
//!     Route::get("/users/{id:int}", |_req| async { Ok(HttpResponse::ok()) })
//!         .unwrap()
//!         .name("user.detail"),
//! );
//!
//! let spec = OpenApiBuilder::new("My API", "1.0.0")
//!     .routes(&app.get_all_routes())
//!     .build();
//! assert!(spec.paths.contains_key("/users/{id}"));
//! ```

pub mod builder;
pub mod spec;
pub mod swagger;

pub use builder::OpenApiBuilder;
pub use spec::{
    ApiKeyLocation, Components, Contact, Info, License, MediaType, OpenApiSpec, Operation,
    Parameter, ParameterLocation, PathItem, Response, Schema, SecurityScheme, Server, Tag,
};
pub use swagger::{spec_json_response, spec_yaml_response, swagger_ui_response, SwaggerConfig};
