use actix_multipart::{Multipart, MultipartError};
use actix_web::{delete, get, post, web, HttpResponse, Result as WebResult};
use futures_util::TryStreamExt as _;
use std::sync::Arc;
use tracing::{error, info};

use crate::api::models::{
    bad_request, failure, success, ConfigPayload, DeleteFileRequest, FeaturesPayload, FilePayload,
    FilesPayload, ModelsPayload, NoPayload, UpdateFileMetadataRequest, UploadPayload,
};
use crate::assistant::{files::ModelListing, models::FileMetadata, AssistantClient};
use crate::config::AppConfig;

// --- Files ---

#[get("/files")]
pub async fn list_files(client: web::Data<Arc<AssistantClient>>) -> WebResult<HttpResponse> {
    match client.list_files().await {
        Ok(files) => Ok(success(
            format!(
                "Files for assistant '{}' retrieved successfully.",
                client.assistant_name()
            ),
            FilesPayload { files },
        )),
        Err(e) => {
            error!("Error listing assistant files: {}", e);
            Ok(failure("list assistant files", &e, FilesPayload::default()))
        }
    }
}

#[derive(Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    metadata: Option<String>,
}

async fn read_upload_form(payload: &mut Multipart) -> Result<UploadForm, MultipartError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "file" => form.file = Some((file_name.unwrap_or_else(|| "upload".to_string()), data)),
            "metadata" => form.metadata = Some(String::from_utf8_lossy(&data).into_owned()),
            _ => {}
        }
    }

    Ok(form)
}

/// An absent or blank metadata field means no metadata.
pub fn parse_upload_metadata(raw: Option<&str>) -> Result<FileMetadata, serde_json::Error> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => serde_json::from_str(text),
        None => Ok(FileMetadata::new()),
    }
}

#[post("/upload-file")]
pub async fn upload_file(
    client: web::Data<Arc<AssistantClient>>,
    mut payload: Multipart,
) -> WebResult<HttpResponse> {
    if let Err(e) = client.require_credentials() {
        return Ok(bad_request(e.to_string(), NoPayload {}));
    }

    let form = match read_upload_form(&mut payload).await {
        Ok(form) => form,
        Err(e) => return Ok(bad_request(format!("Invalid upload: {}", e), NoPayload {})),
    };

    let Some((file_name, bytes)) = form.file else {
        return Ok(bad_request("No file uploaded.", NoPayload {}));
    };

    let metadata = match parse_upload_metadata(form.metadata.as_deref()) {
        Ok(metadata) => metadata,
        Err(e) => {
            error!("Error parsing metadata: {}", e);
            return Ok(bad_request("Invalid metadata format.", NoPayload {}));
        }
    };

    match client.upload_file(&file_name, bytes, metadata).await {
        Ok(uploaded) => Ok(success(
            format!("File '{}' uploaded successfully.", file_name),
            UploadPayload {
                file_id: uploaded.id,
                metadata: uploaded.metadata,
            },
        )),
        Err(e) => {
            error!("Error uploading file: {}", e);
            Ok(failure("upload file", &e, NoPayload {}))
        }
    }
}

#[delete("/delete-file")]
pub async fn delete_file(
    client: web::Data<Arc<AssistantClient>>,
    req: web::Json<DeleteFileRequest>,
) -> WebResult<HttpResponse> {
    if let Err(e) = client.require_credentials() {
        return Ok(bad_request(e.to_string(), NoPayload {}));
    }

    let Some(file_id) = req.into_inner().file_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(bad_request("File ID is required.", NoPayload {}));
    };

    info!("Attempting to delete file with ID: {}", file_id);
    match client.delete_file(&file_id).await {
        Ok(()) => Ok(success("File deleted successfully", NoPayload {})),
        Err(e) => {
            error!("Error deleting file: {}", e);
            Ok(failure("delete file", &e, NoPayload {}))
        }
    }
}

#[post("/update-file-metadata")]
pub async fn update_file_metadata(
    client: web::Data<Arc<AssistantClient>>,
    req: web::Json<UpdateFileMetadataRequest>,
) -> WebResult<HttpResponse> {
    if let Err(e) = client.require_credentials() {
        return Ok(bad_request(e.to_string(), NoPayload {}));
    }

    let req = req.into_inner();
    let Some(file_id) = req.file_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(bad_request("File ID is required.", NoPayload {}));
    };

    match client.update_file_metadata(&file_id, req.metadata).await {
        Ok(file) => Ok(success(
            "File metadata updated successfully",
            FilePayload { file: Some(file) },
        )),
        Err(e) => {
            error!("Error updating file metadata: {}", e);
            Ok(failure("update file metadata", &e, NoPayload {}))
        }
    }
}

// --- Assistant ---

#[get("/assistant-config")]
pub async fn assistant_config(client: web::Data<Arc<AssistantClient>>) -> WebResult<HttpResponse> {
    match client.assistant_config().await {
        Ok(config) => Ok(success(
            "Assistant configuration retrieved successfully.",
            ConfigPayload {
                config: Some(config),
            },
        )),
        Err(e) => {
            error!("Error fetching assistant config: {}", e);
            Ok(failure("fetch assistant config", &e, ConfigPayload::default()))
        }
    }
}

#[get("/models")]
pub async fn list_models(client: web::Data<Arc<AssistantClient>>) -> WebResult<HttpResponse> {
    match client.list_models().await {
        Ok(ModelListing::Upstream(models)) => Ok(success(
            "Available chat models retrieved successfully.",
            ModelsPayload::listed(models),
        )),
        Ok(ModelListing::Sample(models)) => Ok(success(
            "Sample models data (API not available)",
            ModelsPayload::listed(models),
        )),
        Ok(ModelListing::Unavailable) => Ok(success(
            "Models API not available or returned unexpected format.",
            ModelsPayload::listed(Vec::new()),
        )),
        Err(e) => {
            error!("Error fetching models: {}", e);
            Ok(failure("fetch models", &e, ModelsPayload::default()))
        }
    }
}

#[get("/features")]
pub async fn features(config: web::Data<AppConfig>) -> WebResult<HttpResponse> {
    Ok(success(
        "Feature flags retrieved successfully.",
        FeaturesPayload {
            features: config.features.clone(),
        },
    ))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(list_files)
            .service(upload_file)
            .service(delete_file)
            .service(update_file_metadata)
            .service(assistant_config)
            .service(list_models)
            .service(features)
            .service(crate::api::routes_chat::chat),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_upload_metadata_is_empty() {
        assert!(parse_upload_metadata(None).unwrap().is_empty());
        assert!(parse_upload_metadata(Some("  ")).unwrap().is_empty());
        assert_eq!(
            parse_upload_metadata(Some(r#"{"department":"research"}"#)).unwrap()["department"],
            "research"
        );
        assert!(parse_upload_metadata(Some("{not json")).is_err());
    }
}
