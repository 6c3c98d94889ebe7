use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Clone)]
pub struct S3Service {
    client: Client,
    bucket_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum S3ServiceError {
    #[error("S3 error: {0}")]
    S3(String),
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
    #[error("File too large")]
    FileTooLarge,
}

const MAX_OBJECT_SIZE: usize = 10 * 1024 * 1024;

impl S3Service {
    pub fn new(client: Client, bucket_name: String) -> Self {
        Self {
            client,
            bucket_name,
        }
    }

    pub fn calculate_image_hash(image_data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image_data);
        hex::encode(hasher.finalize())
    }

    pub fn generate_s3_key(user_id: Uuid, image_hash: &str, file_extension: &str) -> String {
        format!("images/{}/{}.{}", user_id, image_hash, file_extension)
    }

    pub fn extract_file_extension(mime_type: &str) -> Result<&'static str, S3ServiceError> {
        match mime_type {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Ok("jpg"),
            "image/png" => Ok("png"),
            "image/webp" => Ok("webp"),
            "image/gif" => Ok("gif"),
            "image/bmp" => Ok("bmp"),
            "image/tiff" => Ok("tiff"),
            other => Err(S3ServiceError::InvalidFormat(other.to_string())),
        }
    }

    /// Content-addressed key for an image owned by `user_id`.
    pub fn image_key(
        user_id: Uuid,
        image_data: &[u8],
        mime_type: &str,
    ) -> Result<String, S3ServiceError> {
        let extension = S3Service::extract_file_extension(mime_type)?;
        let image_hash = S3Service::calculate_image_hash(image_data);
        Ok(S3Service::generate_s3_key(user_id, &image_hash, extension))
    }

    pub fn validate_image_size(image_data: &[u8]) -> Result<(), S3ServiceError> {
        if image_data.len() > MAX_OBJECT_SIZE {
            return Err(S3ServiceError::FileTooLarge);
        }
        Ok(())
    }

    pub async fn upload_image(
        &self,
        image_data: &[u8],
        s3_key: &str,
        mime_type: &str,
    ) -> Result<(), S3ServiceError> {
        S3Service::validate_image_size(image_data)?;

        let body = ByteStream::from(image_data.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(s3_key)
            .body(body)
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| S3ServiceError::S3(e.to_string()))?;

        log::info!("Stored image s3://{}/{}", self.bucket_name, s3_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            S3Service::calculate_image_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn key_is_scoped_by_user_and_hash() {
        let user_id = Uuid::nil();
        let key = S3Service::image_key(user_id, b"abc", "image/jpeg").unwrap();
        assert_eq!(
            key,
            "images/00000000-0000-0000-0000-000000000000/\
             ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.jpg"
        );
    }

    #[test]
    fn unknown_mime_has_no_extension() {
        assert!(matches!(
            S3Service::extract_file_extension("image/heic"),
            Err(S3ServiceError::InvalidFormat(_))
        ));
        assert_eq!(S3Service::extract_file_extension("image/png").unwrap(), "png");
    }

    #[test]
    fn oversized_objects_are_refused() {
        assert!(S3Service::validate_image_size(&vec![0u8; MAX_OBJECT_SIZE]).is_ok());
        assert!(matches!(
            S3Service::validate_image_size(&vec![0u8; MAX_OBJECT_SIZE + 1]),
            Err(S3ServiceError::FileTooLarge)
        ));
    }
}
