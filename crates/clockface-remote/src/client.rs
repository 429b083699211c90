use crate::wire::{
    DeleteFacesRequest, DeleteFacesResponse, DetectFacesResponse, DetectProtectiveEquipmentResponse,
    IndexFacesResponse, SearchFacesByImageResponse,
};
use clockface_core::biometric::{
    BiometricError, BiometricService, EquipmentPerson, FaceDetail, FaceMatch, IndexedFace,
};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use std::time::Duration;

const OP_PPE: &str = "detect_protective_equipment";
const OP_QUALITY: &str = "assess_face_quality";
const OP_IDENTIFY: &str = "identify";
const OP_ENROLL: &str = "enroll";
const OP_ROLLBACK: &str = "rollback_enrollment";

/// Error name the service uses when a search image contains no face.
const NO_FACE_IN_SEARCH_IMAGE: &str = "InvalidParameterException";

/// Connection settings for the recognition gateway.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Gateway base URL, e.g. `https://faces.internal:8443`.
    pub base_url: String,
    /// Face collection searched and enrolled into.
    pub collection: String,
    /// Bearer token sent with every request, if set.
    pub token: Option<String>,
    /// Upper bound on each request, connect included.
    pub timeout: Duration,
}

/// [`BiometricService`] backed by the recognition gateway.
pub struct HttpBiometricClient {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl HttpBiometricClient {
    pub fn new(mut config: RemoteConfig) -> Result<Self, BiometricError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| BiometricError::Transport { op: "client", message: e.to_string() })?;

        while config.base_url.ends_with('/') {
            config.base_url.pop();
        }

        tracing::info!(
            base_url = %config.base_url,
            collection = %config.collection,
            timeout_secs = config.timeout.as_secs(),
            "recognition client ready"
        );

        Ok(Self { http, config })
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url, path)
    }

    fn collection_url(&self, action: &str) -> String {
        self.url(&format!("collections/{}/{action}", self.config.collection))
    }

    fn post(&self, op: &'static str, url: String) -> reqwest::RequestBuilder {
        tracing::debug!(op, url = %url, "recognition request");
        let req = self.http.post(url);
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn post_image(&self, op: &'static str, url: String, image: &[u8]) -> reqwest::RequestBuilder {
        self.post(op, url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
    }

    /// Send a request and return the status and body text.
    async fn exchange(
        &self,
        op: &'static str,
        req: reqwest::RequestBuilder,
    ) -> Result<(reqwest::StatusCode, String), BiometricError> {
        let resp = req.send().await.map_err(|e| self.transport_error(op, e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(op, e))?;
        Ok((status, body))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        op: &'static str,
        req: reqwest::RequestBuilder,
    ) -> Result<T, BiometricError> {
        let (status, body) = self.exchange(op, req).await?;
        if !status.is_success() {
            return Err(BiometricError::Service { op, status: status.as_u16(), body });
        }
        decode(op, &body)
    }

    fn transport_error(&self, op: &'static str, err: reqwest::Error) -> BiometricError {
        if err.is_timeout() {
            BiometricError::Timeout { op, after: self.config.timeout }
        } else {
            BiometricError::Transport { op, message: err.to_string() }
        }
    }
}

fn decode<T: DeserializeOwned>(op: &'static str, body: &str) -> Result<T, BiometricError> {
    serde_json::from_str(body).map_err(|e| BiometricError::Decode { op, message: e.to_string() })
}

/// A 400 naming `InvalidParameterException` means the search image had no
/// detectable face, which is a non-match rather than a failure.
fn is_faceless_search(status: reqwest::StatusCode, body: &str) -> bool {
    status == reqwest::StatusCode::BAD_REQUEST && body.contains(NO_FACE_IN_SEARCH_IMAGE)
}

impl BiometricService for HttpBiometricClient {
    async fn detect_protective_equipment(
        &self,
        image: &[u8],
        min_confidence: f32,
    ) -> Result<Vec<EquipmentPerson>, BiometricError> {
        let req = self
            .post_image(OP_PPE, self.url("detect-protective-equipment"), image)
            .query(&[
                ("required_equipment_types", "FACE_COVER".to_string()),
                ("min_confidence", min_confidence.to_string()),
            ]);
        let resp: DetectProtectiveEquipmentResponse = self.call(OP_PPE, req).await?;
        Ok(resp.persons)
    }

    async fn assess_face_quality(&self, image: &[u8]) -> Result<Vec<FaceDetail>, BiometricError> {
        let req = self
            .post_image(OP_QUALITY, self.url("detect-faces"), image)
            .query(&[("attributes", "ALL")]);
        let resp: DetectFacesResponse = self.call(OP_QUALITY, req).await?;
        Ok(resp.face_details)
    }

    async fn identify(&self, image: &[u8], threshold: f32) -> Result<Vec<FaceMatch>, BiometricError> {
        let req = self
            .post_image(OP_IDENTIFY, self.collection_url("search-faces-by-image"), image)
            .query(&[
                ("max_faces", "1".to_string()),
                ("face_match_threshold", threshold.to_string()),
            ]);

        let (status, body) = self.exchange(OP_IDENTIFY, req).await?;
        if is_faceless_search(status, &body) {
            tracing::debug!("search image has no face; treating as no match");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(BiometricError::Service { op: OP_IDENTIFY, status: status.as_u16(), body });
        }

        let mut resp: SearchFacesByImageResponse = decode(OP_IDENTIFY, &body)?;
        resp.face_matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(resp.face_matches)
    }

    async fn enroll(&self, image: &[u8], person_id: &str) -> Result<Vec<IndexedFace>, BiometricError> {
        let req = self
            .post_image(OP_ENROLL, self.collection_url("index-faces"), image)
            .query(&[
                ("external_image_id", person_id),
                ("max_faces", "1"),
                ("quality_filter", "AUTO"),
            ]);
        let resp: IndexFacesResponse = self.call(OP_ENROLL, req).await?;
        Ok(resp.face_records.into_iter().map(|r| r.face).collect())
    }

    async fn rollback_enrollment(&self, face_id: &str) -> Result<(), BiometricError> {
        let req = self
            .post(OP_ROLLBACK, self.collection_url("delete-faces"))
            .json(&DeleteFacesRequest { face_ids: [face_id] });
        let resp: DeleteFacesResponse = self.call(OP_ROLLBACK, req).await?;
        if !resp.deleted_faces.iter().any(|id| id == face_id) {
            return Err(BiometricError::Service {
                op: OP_ROLLBACK,
                status: 200,
                body: format!("face {face_id} was not deleted"),
            });
        }
        Ok(())
    }
}
