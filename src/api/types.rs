//! Kaiheila HTTP API response types

use std::collections::HashMap;

use serde::Deserialize;
use snafu::prelude::*;
use url::Url;

/// Response is common response structure with a code and message, and a data field.
#[derive(Debug, Deserialize)]
pub struct Response<T> {
    /// zero is success, see kaiheila doc for details
    pub code: i64,
    /// error message
    pub message: String,
    /// result data, differ type for each api
    pub data: T,
}

/// data type for api /gateway/index
#[derive(Debug, Deserialize)]
pub struct GatewayIndexData {
    /// gateway url
    pub url: String,
}

/// Parse string as gateway url error
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(parse_gateway_url_error), context(suffix(false)))]
pub enum ParseGatewayURLError {
    #[snafu(display("{s} is an invalid url: {source}"))]
    /// the str is not a valid url
    InvalidURL {
        /// string be parsed
        s: String,
        /// source error
        source: url::ParseError,
    },

    /// the parsed url schema is not websocket
    #[snafu(display("the url {s} has invalid schema {schema}, only ws or wss is ok"))]
    InvalidSchema {
        /// the url
        s: String,
        /// invalid schema
        schema: String,
    },

    /// the parsed url has no host
    #[snafu(display("the gateway url {s} has no host"))]
    NoHost {
        /// the url
        s: String,
    },

    /// the parsed url has no token
    #[snafu(display("the gateway url {s} has no token"))]
    NoToken {
        /// the url
        s: String,
    },
}

/// Check a gateway url returned by /gateway/index.
///
/// It must be a websocket url with a host and a `token` query parameter.
pub fn parse_gateway_url(s: &str) -> Result<Url, ParseGatewayURLError> {
    let url = Url::parse(s).context(parse_gateway_url_error::InvalidURL { s })?;

    ensure!(
        url.scheme() == "wss" || url.scheme() == "ws",
        parse_gateway_url_error::InvalidSchema {
            s,
            schema: url.scheme(),
        }
    );

    ensure!(url.host().is_some(), parse_gateway_url_error::NoHost { s });

    let query = url.query_pairs().collect::<HashMap<_, _>>();

    ensure!(
        query.get("token").map_or(false, |token| !token.is_empty()),
        parse_gateway_url_error::NoToken { s }
    );

    Ok(url)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_valid_gateway_url() {
        let url = parse_gateway_url("wss://ws.kaiheila.cn/gateway?compress=1&token=abc").unwrap();

        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("ws.kaiheila.cn"));
    }

    #[test]
    fn test_parse_invalid_gateway_url() {
        assert!(matches!(
            parse_gateway_url("not a url"),
            Err(ParseGatewayURLError::InvalidURL { .. })
        ));
        assert!(matches!(
            parse_gateway_url("https://ws.kaiheila.cn/gateway?token=abc"),
            Err(ParseGatewayURLError::InvalidSchema { .. })
        ));
        assert!(matches!(
            parse_gateway_url("wss://ws.kaiheila.cn/gateway?compress=1"),
            Err(ParseGatewayURLError::NoToken { .. })
        ));
        assert!(matches!(
            parse_gateway_url("wss://ws.kaiheila.cn/gateway?token="),
            Err(ParseGatewayURLError::NoToken { .. })
        ));
    }

    #[test]
    fn test_parse_api_response() {
        let body = r#"{"code":0,"message":"操作成功","data":{"url":"wss://ws.kaiheila.cn/gateway?token=x"}}"#;

        let resp: Response<GatewayIndexData> = serde_json::from_str(body).unwrap();

        assert_eq!(resp.code, 0);
        assert!(parse_gateway_url(&resp.data.url).is_ok());
    }
}
