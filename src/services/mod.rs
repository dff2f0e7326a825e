// Services module - Business logic

pub mod card_issuer;
pub mod card_limits;
pub mod card_number;
pub mod identity;
pub mod notifications;
pub mod user_client;

#[cfg(test)]
pub mod testing;

use url::Url;

/// Treats `url` as a directory so relative joins keep its path prefix
pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_trailing_slash() {
        let url = with_trailing_slash(Url::parse("http://gateway.local/user-service").unwrap());
        assert_eq!(url.as_str(), "http://gateway.local/user-service/");
        assert_eq!(
            url.join("api/client/5").unwrap().as_str(),
            "http://gateway.local/user-service/api/client/5"
        );

        let url = with_trailing_slash(Url::parse("http://gateway.local/notify/").unwrap());
        assert_eq!(url.as_str(), "http://gateway.local/notify/");

        let url = with_trailing_slash(Url::parse("http://users.local:8080").unwrap());
        assert_eq!(url.as_str(), "http://users.local:8080/");
    }
}
