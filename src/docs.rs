use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::downloads::list_downloads,
		routes::downloads::create_download,
		routes::downloads::get_download
	),
	components(
		schemas(
			models::download::Download,
			models::download::CreateDownloadRequest,
			models::user::User,
			models::user::Role,
			routes::health::HealthResponse
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Health", description = "Service health"),
		(name = "Downloads", description = "Time-limited media downloads")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(
				HttpBuilder::new()
					.scheme(HttpAuthScheme::Bearer)
					.bearer_format("JWT")
					.build(),
			),
		);
	}
}

pub fn build_openapi() -> utoipa::openapi::OpenApi {
	ApiDoc::openapi()
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
	Json(build_openapi())
}
