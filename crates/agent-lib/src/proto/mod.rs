//! Protobuf types and gRPC service for the kmctl agent protocol
//!
//! The source of truth is `proto/kmctl/v1/agent.proto`. The modules below are the
//! checked-in output of tonic-build so the workspace builds without `protoc`;
//! enable the `proto-gen` feature to regenerate them at build time instead.

/// Largest message either side accepts. Pod logs travel as plain text and can be
/// far larger than the 4 MiB gRPC default.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024 * 1024;

/// Status metadata key carrying the agent-side error classification.
pub const ERROR_KIND_KEY: &str = "x-kmctl-error";

#[cfg(feature = "proto-gen")]
pub mod kmctl {
    pub mod v1 {
        tonic::include_proto!("kmctl.v1");
    }
}

#[cfg(not(feature = "proto-gen"))]
pub mod kmctl {
    pub mod v1 {
        use prost::Message;

        #[derive(Clone, PartialEq, Message)]
        pub struct GetNodeRequest {
            #[prost(string, tag = "1")]
            pub name: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct NodeInfo {
            #[prost(string, tag = "1")]
            pub name: String,
            #[prost(string, tag = "2")]
            pub internal_ip: String,
            #[prost(string, tag = "3")]
            pub arch: String,
            #[prost(string, tag = "4")]
            pub kernel_version: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct GetNodesRequest {}

        #[derive(Clone, PartialEq, Message)]
        pub struct NodeSummary {
            #[prost(string, tag = "1")]
            pub name: String,
            #[prost(string, tag = "2")]
            pub internal_ip: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct NodeList {
            #[prost(message, repeated, tag = "1")]
            pub nodes: Vec<NodeSummary>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct GetPodRequest {
            #[prost(string, tag = "1")]
            pub namespace: String,
            #[prost(string, tag = "2")]
            pub name: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct PodInfo {
            #[prost(string, tag = "1")]
            pub name: String,
            #[prost(string, tag = "2")]
            pub namespace: String,
            #[prost(string, tag = "3")]
            pub phase: String,
            #[prost(string, tag = "4")]
            pub label: String,
            #[prost(string, tag = "5")]
            pub status: String,
            #[prost(string, tag = "6")]
            pub image: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct GetPodsRequest {
            #[prost(string, tag = "1")]
            pub namespace: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct PodSummary {
            #[prost(string, tag = "1")]
            pub name: String,
            #[prost(string, tag = "2")]
            pub namespace: String,
            #[prost(string, tag = "3")]
            pub phase: String,
            #[prost(string, tag = "4")]
            pub status: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct PodList {
            #[prost(message, repeated, tag = "1")]
            pub pods: Vec<PodSummary>,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct GetPodLogsRequest {
            #[prost(string, tag = "1")]
            pub namespace: String,
            #[prost(string, tag = "2")]
            pub name: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct PodLogChunk {
            #[prost(string, tag = "1")]
            pub log: String,
        }

        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
        #[repr(i32)]
        pub enum ReconcileAction {
            Unspecified = 0,
            Created = 1,
            Updated = 2,
            Deleted = 3,
        }

        impl ReconcileAction {
            pub fn as_str_name(&self) -> &'static str {
                match self {
                    ReconcileAction::Unspecified => "RECONCILE_ACTION_UNSPECIFIED",
                    ReconcileAction::Created => "RECONCILE_ACTION_CREATED",
                    ReconcileAction::Updated => "RECONCILE_ACTION_UPDATED",
                    ReconcileAction::Deleted => "RECONCILE_ACTION_DELETED",
                }
            }

            pub fn from_str_name(value: &str) -> Option<Self> {
                match value {
                    "RECONCILE_ACTION_UNSPECIFIED" => Some(Self::Unspecified),
                    "RECONCILE_ACTION_CREATED" => Some(Self::Created),
                    "RECONCILE_ACTION_UPDATED" => Some(Self::Updated),
                    "RECONCILE_ACTION_DELETED" => Some(Self::Deleted),
                    _ => None,
                }
            }
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct ManifestRequest {
            #[prost(string, tag = "1")]
            pub yaml: String,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct ManifestResponse {
            #[prost(string, tag = "1")]
            pub message: String,
            #[prost(string, tag = "2")]
            pub kind: String,
            #[prost(string, tag = "3")]
            pub name: String,
            #[prost(string, tag = "4")]
            pub namespace: String,
            #[prost(enumeration = "ReconcileAction", tag = "5")]
            pub action: i32,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct UpgradeManifestRequest {
            #[prost(string, tag = "1")]
            pub yaml: String,
            #[prost(string, tag = "2")]
            pub version: String,
            #[prost(int32, tag = "3")]
            pub component_type: i32,
        }

        #[derive(Clone, PartialEq, Message)]
        pub struct UpgradeManifestResponse {
            #[prost(string, tag = "1")]
            pub message: String,
            #[prost(string, tag = "2")]
            pub kind: String,
            #[prost(string, tag = "3")]
            pub name: String,
            #[prost(string, tag = "4")]
            pub namespace: String,
            #[prost(enumeration = "ReconcileAction", tag = "5")]
            pub action: i32,
            #[prost(int64, tag = "6")]
            pub record_id: i64,
            #[prost(string, tag = "7")]
            pub version: String,
        }

        pub mod agent_service_client {
            use tonic::codegen::*;

            #[derive(Debug, Clone)]
            pub struct AgentServiceClient<T> {
                inner: tonic::client::Grpc<T>,
            }

            impl AgentServiceClient<tonic::transport::Channel> {
                pub fn new(channel: tonic::transport::Channel) -> Self {
                    let inner = tonic::client::Grpc::new(channel);
                    Self { inner }
                }
            }

            impl<T> AgentServiceClient<T>
            where
                T: tonic::client::GrpcService<tonic::body::BoxBody>,
                T::Error: Into<StdError>,
                T::ResponseBody: Body<Data = Bytes> + Send + 'static,
                <T::ResponseBody as Body>::Error: Into<StdError> + Send,
            {
                pub fn with_origin(inner: T, origin: http::Uri) -> Self {
                    let inner = tonic::client::Grpc::with_origin(inner, origin);
                    Self { inner }
                }

                /// Limits the maximum size of a decoded message.
                pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                    self.inner = self.inner.max_decoding_message_size(limit);
                    self
                }

                /// Limits the maximum size of an encoded message.
                pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
                    self.inner = self.inner.max_encoding_message_size(limit);
                    self
                }

                async fn ready(&mut self) -> Result<(), tonic::Status> {
                    self.inner.ready().await.map_err(|e| {
                        tonic::Status::new(
                            tonic::Code::Unknown,
                            format!("Service was not ready: {}", e.into()),
                        )
                    })
                }

                pub async fn get_node(
                    &mut self,
                    request: impl tonic::IntoRequest<super::GetNodeRequest>,
                ) -> Result<tonic::Response<super::NodeInfo>, tonic::Status> {
                    self.ready().await?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path =
                        http::uri::PathAndQuery::from_static("/kmctl.v1.AgentService/GetNode");
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn get_nodes(
                    &mut self,
                    request: impl tonic::IntoRequest<super::GetNodesRequest>,
                ) -> Result<tonic::Response<super::NodeList>, tonic::Status> {
                    self.ready().await?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path =
                        http::uri::PathAndQuery::from_static("/kmctl.v1.AgentService/GetNodes");
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn get_pod(
                    &mut self,
                    request: impl tonic::IntoRequest<super::GetPodRequest>,
                ) -> Result<tonic::Response<super::PodInfo>, tonic::Status> {
                    self.ready().await?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path =
                        http::uri::PathAndQuery::from_static("/kmctl.v1.AgentService/GetPod");
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn get_pods(
                    &mut self,
                    request: impl tonic::IntoRequest<super::GetPodsRequest>,
                ) -> Result<tonic::Response<super::PodList>, tonic::Status> {
                    self.ready().await?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path =
                        http::uri::PathAndQuery::from_static("/kmctl.v1.AgentService/GetPods");
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn get_pod_logs(
                    &mut self,
                    request: impl tonic::IntoRequest<super::GetPodLogsRequest>,
                ) -> Result<
                    tonic::Response<tonic::codec::Streaming<super::PodLogChunk>>,
                    tonic::Status,
                > {
                    self.ready().await?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path =
                        http::uri::PathAndQuery::from_static("/kmctl.v1.AgentService/GetPodLogs");
                    self.inner
                        .server_streaming(request.into_request(), path, codec)
                        .await
                }

                pub async fn apply_manifest(
                    &mut self,
                    request: impl tonic::IntoRequest<super::ManifestRequest>,
                ) -> Result<tonic::Response<super::ManifestResponse>, tonic::Status> {
                    self.ready().await?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/kmctl.v1.AgentService/ApplyManifest",
                    );
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn delete_manifest(
                    &mut self,
                    request: impl tonic::IntoRequest<super::ManifestRequest>,
                ) -> Result<tonic::Response<super::ManifestResponse>, tonic::Status> {
                    self.ready().await?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/kmctl.v1.AgentService/DeleteManifest",
                    );
                    self.inner.unary(request.into_request(), path, codec).await
                }

                pub async fn upgrade_manifest(
                    &mut self,
                    request: impl tonic::IntoRequest<super::UpgradeManifestRequest>,
                ) -> Result<tonic::Response<super::UpgradeManifestResponse>, tonic::Status>
                {
                    self.ready().await?;
                    let codec = tonic::codec::ProstCodec::default();
                    let path = http::uri::PathAndQuery::from_static(
                        "/kmctl.v1.AgentService/UpgradeManifest",
                    );
                    self.inner.unary(request.into_request(), path, codec).await
                }
            }
        }

        pub mod agent_service_server {
            #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
            use tonic::codegen::*;

            #[async_trait]
            pub trait AgentService: Send + Sync + 'static {
                async fn get_node(
                    &self,
                    request: tonic::Request<super::GetNodeRequest>,
                ) -> std::result::Result<tonic::Response<super::NodeInfo>, tonic::Status>;

                async fn get_nodes(
                    &self,
                    request: tonic::Request<super::GetNodesRequest>,
                ) -> std::result::Result<tonic::Response<super::NodeList>, tonic::Status>;

                async fn get_pod(
                    &self,
                    request: tonic::Request<super::GetPodRequest>,
                ) -> std::result::Result<tonic::Response<super::PodInfo>, tonic::Status>;

                async fn get_pods(
                    &self,
                    request: tonic::Request<super::GetPodsRequest>,
                ) -> std::result::Result<tonic::Response<super::PodList>, tonic::Status>;

                /// Server streaming response type for the GetPodLogs method.
                type GetPodLogsStream: tonic::codegen::tokio_stream::Stream<
                        Item = std::result::Result<super::PodLogChunk, tonic::Status>,
                    > + Send
                    + 'static;

                async fn get_pod_logs(
                    &self,
                    request: tonic::Request<super::GetPodLogsRequest>,
                ) -> std::result::Result<tonic::Response<Self::GetPodLogsStream>, tonic::Status>;

                async fn apply_manifest(
                    &self,
                    request: tonic::Request<super::ManifestRequest>,
                ) -> std::result::Result<tonic::Response<super::ManifestResponse>, tonic::Status>;

                async fn delete_manifest(
                    &self,
                    request: tonic::Request<super::ManifestRequest>,
                ) -> std::result::Result<tonic::Response<super::ManifestResponse>, tonic::Status>;

                async fn upgrade_manifest(
                    &self,
                    request: tonic::Request<super::UpgradeManifestRequest>,
                ) -> std::result::Result<
                    tonic::Response<super::UpgradeManifestResponse>,
                    tonic::Status,
                >;
            }

            #[derive(Debug)]
            pub struct AgentServiceServer<T: AgentService> {
                inner: _Inner<T>,
                accept_compression_encodings: EnabledCompressionEncodings,
                send_compression_encodings: EnabledCompressionEncodings,
                max_decoding_message_size: Option<usize>,
                max_encoding_message_size: Option<usize>,
            }

            struct _Inner<T>(Arc<T>);

            impl<T: AgentService> AgentServiceServer<T> {
                pub fn new(inner: T) -> Self {
                    Self::from_arc(Arc::new(inner))
                }

                pub fn from_arc(inner: Arc<T>) -> Self {
                    let inner = _Inner(inner);
                    Self {
                        inner,
                        accept_compression_encodings: Default::default(),
                        send_compression_encodings: Default::default(),
                        max_decoding_message_size: None,
                        max_encoding_message_size: None,
                    }
                }

                /// Limits the maximum size of a decoded message.
                pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                    self.max_decoding_message_size = Some(limit);
                    self
                }

                /// Limits the maximum size of an encoded message.
                pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
                    self.max_encoding_message_size = Some(limit);
                    self
                }
            }

            macro_rules! unary_route {
                ($self:ident, $req:ident, $svc:ident, $method:ident, $request:ty, $response:ty) => {{
                    #[allow(non_camel_case_types)]
                    struct $svc<T: AgentService>(pub Arc<T>);
                    impl<T: AgentService> tonic::server::UnaryService<$request> for $svc<T> {
                        type Response = $response;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<$request>) -> Self::Future {
                            let inner = Arc::clone(&self.0);
                            let fut = async move { (*inner).$method(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = $self.accept_compression_encodings;
                    let send_compression_encodings = $self.send_compression_encodings;
                    let max_decoding_message_size = $self.max_decoding_message_size;
                    let max_encoding_message_size = $self.max_encoding_message_size;
                    let inner = $self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = $svc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec)
                            .apply_compression_config(
                                accept_compression_encodings,
                                send_compression_encodings,
                            )
                            .apply_max_message_size_config(
                                max_decoding_message_size,
                                max_encoding_message_size,
                            );
                        let res = grpc.unary(method, $req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }};
            }

            impl<T, B> tonic::codegen::Service<http::Request<B>> for AgentServiceServer<T>
            where
                T: AgentService,
                B: Body + Send + 'static,
                B::Error: Into<StdError> + Send + 'static,
            {
                type Response = http::Response<tonic::body::BoxBody>;
                type Error = std::convert::Infallible;
                type Future = BoxFuture<Self::Response, Self::Error>;

                fn poll_ready(
                    &mut self,
                    _cx: &mut Context<'_>,
                ) -> Poll<std::result::Result<(), Self::Error>> {
                    Poll::Ready(Ok(()))
                }

                fn call(&mut self, req: http::Request<B>) -> Self::Future {
                    match req.uri().path() {
                        "/kmctl.v1.AgentService/GetNode" => unary_route!(
                            self,
                            req,
                            GetNodeSvc,
                            get_node,
                            super::GetNodeRequest,
                            super::NodeInfo
                        ),
                        "/kmctl.v1.AgentService/GetNodes" => unary_route!(
                            self,
                            req,
                            GetNodesSvc,
                            get_nodes,
                            super::GetNodesRequest,
                            super::NodeList
                        ),
                        "/kmctl.v1.AgentService/GetPod" => unary_route!(
                            self,
                            req,
                            GetPodSvc,
                            get_pod,
                            super::GetPodRequest,
                            super::PodInfo
                        ),
                        "/kmctl.v1.AgentService/GetPods" => unary_route!(
                            self,
                            req,
                            GetPodsSvc,
                            get_pods,
                            super::GetPodsRequest,
                            super::PodList
                        ),
                        "/kmctl.v1.AgentService/GetPodLogs" => {
                            #[allow(non_camel_case_types)]
                            struct GetPodLogsSvc<T: AgentService>(pub Arc<T>);
                            impl<T: AgentService>
                                tonic::server::ServerStreamingService<super::GetPodLogsRequest>
                                for GetPodLogsSvc<T>
                            {
                                type Response = super::PodLogChunk;
                                type ResponseStream = T::GetPodLogsStream;
                                type Future =
                                    BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;
                                fn call(
                                    &mut self,
                                    request: tonic::Request<super::GetPodLogsRequest>,
                                ) -> Self::Future {
                                    let inner = Arc::clone(&self.0);
                                    let fut = async move { (*inner).get_pod_logs(request).await };
                                    Box::pin(fut)
                                }
                            }
                            let accept_compression_encodings = self.accept_compression_encodings;
                            let send_compression_encodings = self.send_compression_encodings;
                            let max_decoding_message_size = self.max_decoding_message_size;
                            let max_encoding_message_size = self.max_encoding_message_size;
                            let inner = self.inner.clone();
                            let fut = async move {
                                let inner = inner.0;
                                let method = GetPodLogsSvc(inner);
                                let codec = tonic::codec::ProstCodec::default();
                                let mut grpc = tonic::server::Grpc::new(codec)
                                    .apply_compression_config(
                                        accept_compression_encodings,
                                        send_compression_encodings,
                                    )
                                    .apply_max_message_size_config(
                                        max_decoding_message_size,
                                        max_encoding_message_size,
                                    );
                                let res = grpc.server_streaming(method, req).await;
                                Ok(res)
                            };
                            Box::pin(fut)
                        }
                        "/kmctl.v1.AgentService/ApplyManifest" => unary_route!(
                            self,
                            req,
                            ApplyManifestSvc,
                            apply_manifest,
                            super::ManifestRequest,
                            super::ManifestResponse
                        ),
                        "/kmctl.v1.AgentService/DeleteManifest" => unary_route!(
                            self,
                            req,
                            DeleteManifestSvc,
                            delete_manifest,
                            super::ManifestRequest,
                            super::ManifestResponse
                        ),
                        "/kmctl.v1.AgentService/UpgradeManifest" => unary_route!(
                            self,
                            req,
                            UpgradeManifestSvc,
                            upgrade_manifest,
                            super::UpgradeManifestRequest,
                            super::UpgradeManifestResponse
                        ),
                        _ => Box::pin(async move {
                            Ok(http::Response::builder()
                                .status(200)
                                .header("grpc-status", "12")
                                .header("content-type", "application/grpc")
                                .body(empty_body())
                                .unwrap())
                        }),
                    }
                }
            }

            impl<T: AgentService> Clone for AgentServiceServer<T> {
                fn clone(&self) -> Self {
                    let inner = self.inner.clone();
                    Self {
                        inner,
                        accept_compression_encodings: self.accept_compression_encodings,
                        send_compression_encodings: self.send_compression_encodings,
                        max_decoding_message_size: self.max_decoding_message_size,
                        max_encoding_message_size: self.max_encoding_message_size,
                    }
                }
            }

            impl<T: AgentService> Clone for _Inner<T> {
                fn clone(&self) -> Self {
                    Self(Arc::clone(&self.0))
                }
            }

            impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{:?}", self.0)
                }
            }

            impl<T: AgentService> tonic::server::NamedService for AgentServiceServer<T> {
                const NAME: &'static str = "kmctl.v1.AgentService";
            }
        }
    }
}

pub use kmctl::v1::agent_service_client::AgentServiceClient;
pub use kmctl::v1::agent_service_server::{AgentService, AgentServiceServer};
pub use kmctl::v1::*;
