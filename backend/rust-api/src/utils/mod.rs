use mongodb::bson::oid::ObjectId;

use crate::error::ApiError;

/// Path ids are 24-char hex ObjectIds; anything else is a 400 with `message`.
pub fn parse_object_id(raw: &str, message: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_id() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "Invalid survey ID").unwrap(), id);

        let err = parse_object_id("not-an-id", "Invalid survey ID").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg == "Invalid survey ID"));
    }
}
