//! Transport tests: codec behaviour and a full request/response exchange
//! against a live [`TcpServer`](crate::transport::TcpServer).

#[cfg(test)]
mod tests {
    use crate::protocol::{GeoRpcError, Request, Response};
    use crate::transport::{JsonCodec, TcpServer, TcpTransportAsync};
    use serde_json::json;

    #[test]
    fn test_encode_decode_request_keeps_metadata() {
        let original = Request::new("/geo.v1.Geo/AddAddress", json!({"street": "Main"}))
            .with_metadata("service-client", "tests");

        let encoded = JsonCodec::encode_request(&original).unwrap();
        let decoded = JsonCodec::decode_request(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_encode_decode_error_response() {
        let original = Response::error(999, "test error message");

        let encoded = JsonCodec::encode_response(&original).unwrap();
        let decoded = JsonCodec::decode_response(&encoded).unwrap();

        assert_eq!(original.id, decoded.id);
        assert!(!decoded.success);
        assert_eq!(decoded.error, Some("test error message".to_string()));
    }

    #[test]
    fn test_invalid_request_data_returns_error() {
        let invalid_data = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result = JsonCodec::decode_request(&invalid_data);
        assert!(matches!(result, Err(GeoRpcError::JsonSerialization(_))));
    }

    #[tokio::test]
    async fn test_request_response_over_tcp() {
        let server = TcpServer::new("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            server
                .run_with_handler(|req: Request| async move {
                    Ok::<_, GeoRpcError>(Response::success(req.id, json!({"echo": req.method})))
                })
                .await
        });

        let transport = TcpTransportAsync::new();
        let mut stream = transport.connect(&addr).await.unwrap();

        // Two requests on the same stream
        for method in ["GetAddress", "GetAddresses"] {
            let request = Request::new(method, json!({}));
            let response = transport.send_request(&mut stream, &request).await.unwrap();
            assert_eq!(response.id, request.id);
            assert_eq!(response.result, Some(json!({"echo": method})));
        }
    }

    #[tokio::test]
    async fn test_handler_error_becomes_error_response() {
        let server = TcpServer::new("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            server
                .run_with_handler(|_req: Request| async move {
                    Err::<Response, _>(GeoRpcError::Remote("address not found".to_string()))
                })
                .await
        });

        let transport = TcpTransportAsync::new();
        let mut stream = transport.connect(&addr).await.unwrap();
        let request = Request::new("GetAddress", json!({"id": "missing"}));
        let response = transport.send_request(&mut stream, &request).await.unwrap();

        assert!(!response.success);
        assert_eq!(response.id, request.id);
        assert!(response.error.unwrap().contains("address not found"));
    }
}
