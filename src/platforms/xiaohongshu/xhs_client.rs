// 小红书HTTP客户端
// Xiaohongshu HTTP Client
//
// 本模块负责与小红书创作平台API的HTTP通信
// 主要功能：
// - 请求签名 (x-s / x-t)
// - 获取上传许可 (Upload Permit)
// - 上传视频与封面 (ROS Upload)
// - 获取视频首帧图片 (First Frame)
// - 搜索话题建议 (Suggest Topic)
// - 创建视频笔记 (Create Note)

use super::sign::RequestSigner;
use super::utils::{parse_cookie_string, post_time_millis};
use crate::core::{Pacer, PlatformError, SignRequest, TokioPacer, UploadRequest};
use crate::platforms::{NoteApi, NoteApiConnector};
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// 常量
// ============================================================================

/// 主站API
pub const EDITH_HOST: &str = "https://edith.xiaohongshu.com";

/// 创作平台API
pub const CREATOR_HOST: &str = "https://creator.xiaohongshu.com";

/// 文件上传服务
pub const UPLOAD_HOST: &str = "https://ros-upload.xiaohongshu.com";

const WEB_ORIGIN: &str = "https://www.xiaohongshu.com";

const CREATOR_REFERER: &str = "https://creator.xiaohongshu.com/";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// IP 被封禁
const CODE_IP_BLOCKED: i64 = 300012;

/// 签名错误
const CODE_SIGN_FAULT: i64 = 300015;

/// 需要验证码的 HTTP 状态
const NEED_VERIFY_STATUS: [u16; 2] = [461, 471];

/// 未上传封面时轮询首帧的次数与间隔
const FIRST_FRAME_POLL_ATTEMPTS: u32 = 10;
const FIRST_FRAME_POLL_INTERVAL: Duration = Duration::from_secs(3);

// ============================================================================
// 类型定义
// ============================================================================

/// 上传许可
#[derive(Debug, Clone)]
pub struct UploadPermit {
    pub file_id: String,
    pub token: String,
}

/// 上传文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    fn scene(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            MediaKind::Video => "video/mp4",
            MediaKind::Image => "image/jpeg",
        }
    }
}

/// 各服务的根地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XhsHosts {
    pub edith: String,
    pub creator: String,
    pub upload: String,
}

impl XhsHosts {
    /// 所有服务指向同一个根地址
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            edith: base.clone(),
            creator: base.clone(),
            upload: base,
        }
    }
}

impl Default for XhsHosts {
    fn default() -> Self {
        Self {
            edith: EDITH_HOST.to_string(),
            creator: CREATOR_HOST.to_string(),
            upload: UPLOAD_HOST.to_string(),
        }
    }
}

// ============================================================================
// 小红书客户端实现
// ============================================================================

/// 绑定单个账号 Cookie 的小红书客户端
#[derive(Clone)]
pub struct XhsClient {
    /// 原始 Cookie 字符串
    cookies: String,
    /// 设备标识
    a1: String,
    web_session: String,
    signer: Arc<dyn RequestSigner>,
    hosts: XhsHosts,
    /// 首帧轮询的等待
    pacer: Arc<dyn Pacer>,
    http_client: reqwest::Client,
}

impl XhsClient {
    /// 创建新的小红书客户端
    ///
    /// # 参数
    ///
    /// * `cookies` - 账号 Cookie 字符串
    /// * `signer` - 请求签名实现
    /// * `timeout` - 单个请求超时
    pub fn new(cookies: &str, signer: Arc<dyn RequestSigner>, timeout: Duration) -> Result<Self, PlatformError> {
        let cookie_map = parse_cookie_string(cookies);
        let a1 = cookie_map.get("a1").cloned().unwrap_or_default();
        let web_session = cookie_map.get("web_session").cloned().unwrap_or_default();

        if a1.is_empty() {
            tracing::warn!("[XhsClient] Cookie 中没有 a1，签名可能失败");
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::NetworkError(e.to_string()))?;

        Ok(Self {
            cookies: cookies.to_string(),
            a1,
            web_session,
            signer,
            hosts: XhsHosts::default(),
            pacer: Arc::new(TokioPacer),
            http_client,
        })
    }

    pub fn with_hosts(mut self, hosts: XhsHosts) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn a1(&self) -> &str {
        &self.a1
    }

    pub fn web_session(&self) -> &str {
        &self.web_session
    }

    // -------------------------------------------------------------------------
    // 请求基础设施
    // -------------------------------------------------------------------------

    /// 签名并构建通用请求头
    async fn signed_headers(&self, uri: &str, data: Option<&Value>) -> Result<HeaderMap, PlatformError> {
        let signs = self
            .signer
            .sign(&SignRequest {
                uri: uri.to_string(),
                data: data.cloned(),
                a1: self.a1.clone(),
                web_session: self.web_session.clone(),
            })
            .await?;

        let mut headers = HeaderMap::new();
        headers.insert("x-s", header_value(&signs.x_s)?);
        headers.insert("x-t", header_value(&signs.x_t)?);
        headers.insert("cookie", header_value(&self.cookies)?);
        headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
        headers.insert("origin", HeaderValue::from_static(WEB_ORIGIN));
        headers.insert("referer", HeaderValue::from_static("https://www.xiaohongshu.com/"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json;charset=UTF-8"));
        Ok(headers)
    }

    /// 签名 GET 请求
    async fn get(
        &self,
        host: &str,
        uri: &str,
        params: &IndexMap<&str, String>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<Value, PlatformError> {
        let final_uri = build_uri(uri, params);
        let mut headers = self.signed_headers(&final_uri, None).await?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let response = self
            .http_client
            .get(format!("{}{}", host, final_uri))
            .headers(headers)
            .send()
            .await?;

        handle_response(response).await
    }

    /// 签名 POST 请求
    async fn post(
        &self,
        host: &str,
        uri: &str,
        data: &Value,
        extra_headers: Option<HeaderMap>,
    ) -> Result<Value, PlatformError> {
        let mut headers = self.signed_headers(uri, Some(data)).await?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let body = serde_json::to_string(data)
            .map_err(|e| PlatformError::InvalidInput(e.to_string()))?;

        let response = self
            .http_client
            .post(format!("{}{}", host, uri))
            .headers(headers)
            .body(body)
            .send()
            .await?;

        handle_response(response).await
    }

    // -------------------------------------------------------------------------
    // API: 上传
    // -------------------------------------------------------------------------

    /// 获取上传许可
    pub async fn get_upload_files_permit(&self, kind: MediaKind) -> Result<UploadPermit, PlatformError> {
        let mut params = IndexMap::new();
        params.insert("biz_name", "spectrum".to_string());
        params.insert("scene", kind.scene().to_string());
        params.insert("file_count", "1".to_string());
        params.insert("version", "1".to_string());
        params.insert("source", "web".to_string());

        let data = self
            .get(&self.hosts.creator, "/api/media/v1/upload/web/permit", &params, None)
            .await?;

        let permit = &data["uploadTempPermits"][0];
        let file_id = permit["fileIds"][0].as_str().unwrap_or("").to_string();
        let token = permit["token"].as_str().unwrap_or("").to_string();

        if file_id.is_empty() || token.is_empty() {
            return Err(PlatformError::VideoUploadFailed(format!("上传许可格式错误: {}", data)));
        }

        Ok(UploadPermit { file_id, token })
    }

    /// 上传文件到 ROS
    ///
    /// # 返回
    ///
    /// 上传服务的响应头
    pub async fn upload_file(
        &self,
        permit: &UploadPermit,
        path: &Path,
        kind: MediaKind,
    ) -> Result<HeaderMap, PlatformError> {
        let bytes = tokio::fs::read(path).await?;
        tracing::info!("[XhsClient] 上传文件 {} ({} 字节)", path.display(), bytes.len());

        let response = self
            .http_client
            .put(format!("{}/{}", self.hosts.upload, permit.file_id))
            .header("X-Cos-Security-Token", header_value(&permit.token)?)
            .header(CONTENT_TYPE, kind.content_type())
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PlatformError::VideoUploadFailed(format!("HTTP {}: {}", status, text)));
        }

        Ok(response.headers().clone())
    }

    /// 等待平台生成首帧图片
    async fn poll_first_frame(&self, video_id: &str) -> Result<Value, PlatformError> {
        for attempt in 0..FIRST_FRAME_POLL_ATTEMPTS {
            self.pacer.pause(FIRST_FRAME_POLL_INTERVAL).await;
            let image_id = self.get_video_first_frame_image_id(video_id).await?;
            if !is_blank(&image_id) {
                return Ok(image_id);
            }
            tracing::debug!("[XhsClient] 首帧尚未生成 (第 {} 次)", attempt + 1);
        }
        tracing::warn!("[XhsClient] 视频 {} 的首帧图片未生成", video_id);
        Ok(Value::Null)
    }
}

#[async_trait::async_trait]
impl NoteApi for XhsClient {
    async fn get_video_first_frame_image_id(&self, video_id: &str) -> Result<Value, PlatformError> {
        let mut params = IndexMap::new();
        params.insert("video_id", video_id.to_string());

        let data = self
            .get(&self.hosts.creator, "/web_api/sns/v1/video/first_frame", &params, Some(creator_referer()))
            .await?;

        Ok(data.get("first_frame_image_id").cloned().unwrap_or(Value::Null))
    }

    async fn get_suggest_topic(&self, keyword: &str) -> Result<Vec<Value>, PlatformError> {
        let data = json!({
            "keyword": keyword,
            "suggest_topic_request": {"title": "", "desc": ""},
            "page": {"page_size": 20, "page": 1}
        });

        let res = self.post(&self.hosts.edith, "/web_api/sns/v1/search/topic", &data, None).await?;
        Ok(res["topic_info_dtos"].as_array().cloned().unwrap_or_default())
    }

    async fn create_video_note(&self, request: &UploadRequest) -> Result<Value, PlatformError> {
        tracing::info!("[XhsClient] 步骤1: 上传视频文件");
        let permit = self.get_upload_files_permit(MediaKind::Video).await?;
        let headers = self.upload_file(&permit, &request.video_path, MediaKind::Video).await?;
        let video_id = headers
            .get("X-Ros-Video-Id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        tracing::info!("[XhsClient] 视频上传完成 file_id={} video_id={}", permit.file_id, video_id);

        tracing::info!("[XhsClient] 步骤2: 准备封面");
        let (image_id, is_upload) = match &request.cover_path {
            Some(cover) => {
                let cover_permit = self.get_upload_files_permit(MediaKind::Image).await?;
                self.upload_file(&cover_permit, cover, MediaKind::Image).await?;
                (Value::String(cover_permit.file_id), true)
            }
            None => (self.poll_first_frame(&video_id).await?, false),
        };

        tracing::info!("[XhsClient] 步骤3: 提交笔记");
        let post_time = request.post_time.as_deref().and_then(post_time_millis);
        let body = build_note_payload(request, &permit.file_id, image_id, is_upload, post_time)?;

        self.post(&self.hosts.edith, "/web_api/sns/v2/note", &body, Some(creator_referer()))
            .await
    }
}

// ============================================================================
// 连接器
// ============================================================================

/// 用签名器和超时配置构造 [`XhsClient`]
#[derive(Clone)]
pub struct XhsConnector {
    signer: Arc<dyn RequestSigner>,
    timeout: Duration,
    hosts: XhsHosts,
    pacer: Arc<dyn Pacer>,
}

impl XhsConnector {
    pub fn new(signer: Arc<dyn RequestSigner>, timeout: Duration) -> Self {
        Self {
            signer,
            timeout,
            hosts: XhsHosts::default(),
            pacer: Arc::new(TokioPacer),
        }
    }

    pub fn with_hosts(mut self, hosts: XhsHosts) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }
}

impl NoteApiConnector for XhsConnector {
    fn connect(&self, cookies: &str) -> Result<Arc<dyn NoteApi>, PlatformError> {
        let client = XhsClient::new(cookies, self.signer.clone(), self.timeout)?
            .with_hosts(self.hosts.clone())
            .with_pacer(self.pacer.clone());
        Ok(Arc::new(client))
    }
}

// ============================================================================
// 辅助函数
// ============================================================================

/// 拼接签名用的 URI（参数按插入顺序，不做转义）
pub fn build_uri(uri: &str, params: &IndexMap<&str, String>) -> String {
    if params.is_empty() {
        return uri.to_string();
    }
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", uri, query)
}

/// 构建创建笔记的请求体
pub fn build_note_payload(
    request: &UploadRequest,
    file_id: &str,
    image_id: Value,
    is_upload: bool,
    post_time: Option<i64>,
) -> Result<Value, PlatformError> {
    let business_binds = json!({
        "version": 1,
        "noteId": 0,
        "noteOrderBind": {},
        "notePostTiming": {"postTime": post_time},
        "noteCollectionBind": {"id": ""}
    });

    Ok(json!({
        "common": {
            "type": "video",
            "title": request.title,
            "note_id": "",
            "desc": request.description,
            "source": r#"{"type":"web","ids":"","extraInfo":"{\"subType\":\"official\"}"}"#,
            "business_binds": serde_json::to_string(&business_binds)
                .map_err(|e| PlatformError::InvalidInput(e.to_string()))?,
            "ats": [],
            "hash_tag": request.topics,
            "post_loc": {},
            "privacy_info": {"op_type": 1, "type": i32::from(request.is_private)}
        },
        "image_info": null,
        "video_info": {
            "file_id": file_id,
            "timelines": [],
            "cover": {
                "file_id": image_id,
                "frame": {"ts": 0, "is_user_select": false, "is_upload": is_upload}
            },
            "chapters": [],
            "chapter_sync_text": false,
            "entrance": "web"
        }
    }))
}

/// 解析平台响应
///
/// 空响应体返回响应头；`success = true` 返回 data；其余按错误码分类
async fn handle_response(response: reqwest::Response) -> Result<Value, PlatformError> {
    let status = response.status();
    let headers = headers_to_json(response.headers());
    let text = response.text().await?;

    if text.is_empty() {
        return Ok(headers);
    }

    if NEED_VERIFY_STATUS.contains(&status.as_u16()) {
        return Err(PlatformError::AuthenticationFailed(format!(
            "出现验证码，请求失败 (HTTP {})",
            status
        )));
    }

    let data: Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(_) => return Ok(Value::String(text)),
    };

    classify_response(data)
}

/// 按 success / code 字段分类响应
fn classify_response(data: Value) -> Result<Value, PlatformError> {
    if data["success"].as_bool().unwrap_or(false) {
        return Ok(data.get("data").cloned().unwrap_or(Value::Bool(true)));
    }

    let msg = data["msg"].as_str().unwrap_or("").to_string();
    match data["code"].as_i64() {
        Some(CODE_IP_BLOCKED) => Err(PlatformError::IpBlocked(msg)),
        Some(CODE_SIGN_FAULT) => Err(PlatformError::SignatureRejected(msg)),
        _ => Err(PlatformError::DataFetch(data.to_string())),
    }
}

fn headers_to_json(headers: &HeaderMap) -> Value {
    let map = headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), Value::String(v.to_string()))))
        .collect::<serde_json::Map<_, _>>();
    Value::Object(map)
}

fn header_value(value: &str) -> Result<HeaderValue, PlatformError> {
    HeaderValue::from_str(value)
        .map_err(|e| PlatformError::InvalidCredentials(format!("请求头包含非法字符: {}", e)))
}

fn creator_referer() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("referer", HeaderValue::from_static(CREATOR_REFERER));
    headers
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SignedHeaders, Topic};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const COOKIES: &str = "a1=18c1a2b3d4e; web_session=040069b1";

    struct FixedSigner;

    #[async_trait::async_trait]
    impl RequestSigner for FixedSigner {
        async fn sign(&self, _request: &SignRequest) -> Result<SignedHeaders, PlatformError> {
            Ok(SignedHeaders {
                x_s: "XYW_test".to_string(),
                x_t: "1700000000000".to_string(),
            })
        }
    }

    /// 记录签名请求
    #[derive(Default)]
    struct RecordingSigner {
        requests: Mutex<Vec<SignRequest>>,
    }

    #[async_trait::async_trait]
    impl RequestSigner for RecordingSigner {
        async fn sign(&self, request: &SignRequest) -> Result<SignedHeaders, PlatformError> {
            self.requests.lock().unwrap().push(request.clone());
            FixedSigner.sign(request).await
        }
    }

    #[derive(Default)]
    struct RecordingPacer {
        pauses: Mutex<Vec<Duration>>,
    }

    #[async_trait::async_trait]
    impl Pacer for RecordingPacer {
        async fn pause(&self, duration: Duration) {
            self.pauses.lock().unwrap().push(duration);
        }
    }

    fn client_for(server: &MockServer, signer: Arc<dyn RequestSigner>, pacer: Arc<dyn Pacer>) -> XhsClient {
        XhsClient::new(COOKIES, signer, Duration::from_secs(5))
            .unwrap()
            .with_hosts(XhsHosts::single(&server.uri()))
            .with_pacer(pacer)
    }

    fn success(data: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "msg": "成功", "data": data}))
    }

    async fn mount_permit(server: &MockServer, scene: &str, file_id: &str, token: &str) {
        Mock::given(method("GET"))
            .and(path("/api/media/v1/upload/web/permit"))
            .and(query_param("scene", scene))
            .respond_with(success(json!({
                "uploadTempPermits": [{"fileIds": [file_id], "token": token, "expireTime": 1700000600000i64}]
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_note(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/web_api/sns/v2/note"))
            .and(header("referer", CREATOR_REFERER))
            .respond_with(success(json!({"id": "6650a1b2c3", "score": 10})))
            .expect(1)
            .mount(server)
            .await;
    }

    fn find<'a>(requests: &'a [Request], verb: &str, route: &str) -> &'a Request {
        requests
            .iter()
            .find(|r| r.method.as_str() == verb && r.url.path() == route)
            .unwrap()
    }

    fn video_request(dir: &tempfile::TempDir, cover: Option<PathBuf>) -> UploadRequest {
        let video_path = dir.path().join("vlog.mp4");
        std::fs::write(&video_path, b"fake video bytes").unwrap();
        UploadRequest {
            video_path,
            title: "周末".to_string(),
            description: "周末\n\n\n#旅行[话题]#".to_string(),
            cover_path: cover,
            topics: vec![Topic::from_value(&json!({"id": "5be0", "name": "旅行"})).unwrap()],
            is_private: false,
            post_time: None,
        }
    }

    #[test]
    fn test_default_hosts() {
        let hosts = XhsHosts::default();
        assert_eq!(hosts.edith, EDITH_HOST);
        assert_eq!(hosts.creator, CREATOR_HOST);
        assert_eq!(hosts.upload, UPLOAD_HOST);
        assert_eq!(XhsHosts::single("http://127.0.0.1:8080/").upload, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_client_reads_session_from_cookie() {
        let client = XhsClient::new(
            "abRequestId=1; a1=18c1a2b3d4e; web_session=040069b1",
            Arc::new(FixedSigner),
            Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(client.a1(), "18c1a2b3d4e");
        assert_eq!(client.web_session(), "040069b1");
    }

    #[test]
    fn test_connector_builds_client() {
        let connector = XhsConnector::new(Arc::new(FixedSigner), Duration::from_secs(60));
        assert!(connector.connect("a1=x; web_session=y").is_ok());
    }

    #[test]
    fn test_build_uri_keeps_param_order() {
        let mut params = IndexMap::new();
        params.insert("biz_name", "spectrum".to_string());
        params.insert("scene", "video".to_string());
        params.insert("file_count", "1".to_string());
        assert_eq!(
            build_uri("/api/media/v1/upload/web/permit", &params),
            "/api/media/v1/upload/web/permit?biz_name=spectrum&scene=video&file_count=1"
        );
        assert_eq!(build_uri("/api/x", &IndexMap::new()), "/api/x");
    }

    #[test]
    fn test_note_payload() {
        let topic = Topic::from_value(&json!({"id": "5be0", "name": "旅行"})).unwrap();
        let request = UploadRequest {
            video_path: PathBuf::from("/tmp/v.mp4"),
            title: "标题".to_string(),
            description: "正文\n\n\n#旅行[话题]#".to_string(),
            cover_path: None,
            topics: vec![topic],
            is_private: true,
            post_time: Some("2024-06-01 10:00:00".to_string()),
        };

        let payload =
            build_note_payload(&request, "spectrum/abc", json!("frame-1"), false, Some(1717207200000)).unwrap();

        let common = &payload["common"];
        assert_eq!(common["type"], "video");
        assert_eq!(common["title"], "标题");
        assert_eq!(common["privacy_info"]["type"], 1);
        assert_eq!(common["hash_tag"][0]["name"], "旅行");
        assert_eq!(common["hash_tag"][0]["type"], "topic");
        assert_eq!(common["hash_tag"][0]["id"], "5be0");

        let binds: Value = serde_json::from_str(common["business_binds"].as_str().unwrap()).unwrap();
        assert_eq!(binds["notePostTiming"]["postTime"], 1717207200000i64);

        let video = &payload["video_info"];
        assert_eq!(video["file_id"], "spectrum/abc");
        assert_eq!(video["cover"]["file_id"], "frame-1");
        assert_eq!(video["cover"]["frame"]["is_upload"], false);
    }

    #[test]
    fn test_note_payload_immediate_publish() {
        let request = UploadRequest::default();
        let payload = build_note_payload(&request, "f", Value::Null, false, None).unwrap();
        let binds: Value =
            serde_json::from_str(payload["common"]["business_binds"].as_str().unwrap()).unwrap();
        assert!(binds["notePostTiming"]["postTime"].is_null());
        assert_eq!(payload["common"]["privacy_info"]["type"], 0);
        assert_eq!(payload["common"]["hash_tag"], json!([]));
    }

    #[test]
    fn test_classify_response() {
        let ok = classify_response(json!({"success": true, "data": {"id": "n1"}})).unwrap();
        assert_eq!(ok["id"], "n1");

        let no_data = classify_response(json!({"success": true})).unwrap();
        assert_eq!(no_data, Value::Bool(true));

        assert!(matches!(
            classify_response(json!({"success": false, "code": 300012, "msg": "ip"})),
            Err(PlatformError::IpBlocked(_))
        ));
        assert!(matches!(
            classify_response(json!({"success": false, "code": 300015})),
            Err(PlatformError::SignatureRejected(_))
        ));
        assert!(matches!(
            classify_response(json!({"success": false, "code": -1, "msg": "登录已过期"})),
            Err(PlatformError::DataFetch(_))
        ));
    }

    #[test]
    fn test_invalid_cookie_header_rejected() {
        assert!(matches!(header_value("a1=x\nbad"), Err(PlatformError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_suggest_topic_sends_signed_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/web_api/sns/v1/search/topic"))
            .and(header("x-s", "XYW_test"))
            .and(header("x-t", "1700000000000"))
            .and(body_partial_json(json!({"keyword": "旅行", "page": {"page_size": 20, "page": 1}})))
            .respond_with(success(json!({
                "topic_info_dtos": [
                    {"id": "5be0", "name": "旅行", "link": "https://www.xiaohongshu.com/page/topics/5be0"},
                    {"id": "5be1", "name": "旅行日记"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let signer = Arc::new(RecordingSigner::default());
        let client = client_for(&server, signer.clone(), Arc::new(RecordingPacer::default()));
        let topics = client.get_suggest_topic("旅行").await.unwrap();

        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0]["name"], "旅行");

        let received = server.received_requests().await.unwrap();
        let headers = &received[0].headers;
        assert_eq!(headers.get("cookie").unwrap().to_str().unwrap(), COOKIES);
        assert_eq!(headers.get("origin").unwrap().to_str().unwrap(), WEB_ORIGIN);

        let signed = signer.requests.lock().unwrap();
        assert_eq!(signed[0].uri, "/web_api/sns/v1/search/topic");
        assert_eq!(signed[0].a1, "18c1a2b3d4e");
        assert_eq!(signed[0].web_session, "040069b1");
        assert_eq!(signed[0].data.as_ref().unwrap()["keyword"], "旅行");
    }

    #[tokio::test]
    async fn test_suggest_topic_error_envelopes() {
        let server = MockServer::start().await;
        let responses = [
            ResponseTemplate::new(200).set_body_json(json!({"success": false, "code": 300012, "msg": "IP存在风险"})),
            ResponseTemplate::new(200).set_body_json(json!({"success": false, "code": 300015, "msg": "签名错误"})),
            ResponseTemplate::new(461).set_body_string("{\"code\":-1}"),
            ResponseTemplate::new(200).set_body_json(json!({"success": false, "code": -100, "msg": "登录已过期"})),
        ];
        for response in responses {
            Mock::given(method("POST"))
                .and(path("/web_api/sns/v1/search/topic"))
                .respond_with(response)
                .up_to_n_times(1)
                .mount(&server)
                .await;
        }

        let client = client_for(&server, Arc::new(FixedSigner), Arc::new(RecordingPacer::default()));

        assert!(matches!(client.get_suggest_topic("a").await, Err(PlatformError::IpBlocked(_))));
        assert!(matches!(client.get_suggest_topic("a").await, Err(PlatformError::SignatureRejected(_))));
        assert!(matches!(client.get_suggest_topic("a").await, Err(PlatformError::AuthenticationFailed(_))));
        assert!(matches!(client.get_suggest_topic("a").await, Err(PlatformError::DataFetch(_))));
    }

    #[tokio::test]
    async fn test_first_frame_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/web_api/sns/v1/video/first_frame"))
            .and(query_param("video_id", "vid-9"))
            .and(header("referer", CREATOR_REFERER))
            .respond_with(success(json!({"first_frame_image_id": "frame-77"})))
            .expect(1)
            .mount(&server)
            .await;

        let signer = Arc::new(RecordingSigner::default());
        let client = client_for(&server, signer.clone(), Arc::new(RecordingPacer::default()));

        assert_eq!(client.get_video_first_frame_image_id("vid-9").await.unwrap(), "frame-77");
        let signed = signer.requests.lock().unwrap();
        assert_eq!(signed[0].uri, "/web_api/sns/v1/video/first_frame?video_id=vid-9");
        assert!(signed[0].data.is_none());
    }

    #[tokio::test]
    async fn test_plain_text_response_is_returned_as_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/web_api/sns/v2/note"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(FixedSigner), Arc::new(RecordingPacer::default()));
        let data = client.post(&server.uri(), "/web_api/sns/v2/note", &json!({}), None).await.unwrap();
        assert_eq!(data, Value::String("ok".to_string()));
    }

    #[tokio::test]
    async fn test_permit_without_file_id_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/media/v1/upload/web/permit"))
            .respond_with(success(json!({"uploadTempPermits": []})))
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(FixedSigner), Arc::new(RecordingPacer::default()));
        assert!(matches!(
            client.get_upload_files_permit(MediaKind::Video).await,
            Err(PlatformError::VideoUploadFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_create_note_polls_first_frame_without_cover() {
        let server = MockServer::start().await;
        mount_permit(&server, "video", "spectrum/v1", "tok-v").await;
        Mock::given(method("PUT"))
            .and(path("/spectrum/v1"))
            .and(header("X-Cos-Security-Token", "tok-v"))
            .and(header("content-type", "video/mp4"))
            .respond_with(ResponseTemplate::new(200).insert_header("X-Ros-Video-Id", "vid-9"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/web_api/sns/v1/video/first_frame"))
            .and(query_param("video_id", "vid-9"))
            .respond_with(success(json!({"first_frame_image_id": ""})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/web_api/sns/v1/video/first_frame"))
            .and(query_param("video_id", "vid-9"))
            .respond_with(success(json!({"first_frame_image_id": "frame-77"})))
            .mount(&server)
            .await;
        mount_note(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let request = video_request(&dir, None);
        let signer = Arc::new(RecordingSigner::default());
        let pacer = Arc::new(RecordingPacer::default());
        let client = client_for(&server, signer.clone(), pacer.clone());

        let note = client.create_video_note(&request).await.unwrap();
        assert_eq!(note["id"], "6650a1b2c3");

        assert_eq!(*pacer.pauses.lock().unwrap(), vec![FIRST_FRAME_POLL_INTERVAL; 3]);
        assert_eq!(
            signer.requests.lock().unwrap()[0].uri,
            "/api/media/v1/upload/web/permit?biz_name=spectrum&scene=video&file_count=1&version=1&source=web"
        );

        let received = server.received_requests().await.unwrap();
        assert_eq!(find(&received, "PUT", "/spectrum/v1").body, b"fake video bytes".to_vec());

        let body: Value = find(&received, "POST", "/web_api/sns/v2/note").body_json().unwrap();
        assert_eq!(body["common"]["title"], "周末");
        assert_eq!(body["common"]["hash_tag"][0]["id"], "5be0");
        assert_eq!(body["video_info"]["file_id"], "spectrum/v1");
        assert_eq!(body["video_info"]["cover"]["file_id"], "frame-77");
        assert_eq!(body["video_info"]["cover"]["frame"]["is_upload"], false);
    }

    #[tokio::test]
    async fn test_create_note_gives_up_on_first_frame() {
        let server = MockServer::start().await;
        mount_permit(&server, "video", "spectrum/v2", "tok-v").await;
        Mock::given(method("PUT"))
            .and(path("/spectrum/v2"))
            .respond_with(ResponseTemplate::new(200).insert_header("X-Ros-Video-Id", "vid-10"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/web_api/sns/v1/video/first_frame"))
            .respond_with(success(json!({})))
            .expect(u64::from(FIRST_FRAME_POLL_ATTEMPTS))
            .mount(&server)
            .await;
        mount_note(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let pacer = Arc::new(RecordingPacer::default());
        let client = client_for(&server, Arc::new(FixedSigner), pacer.clone());

        client.create_video_note(&video_request(&dir, None)).await.unwrap();

        assert_eq!(pacer.pauses.lock().unwrap().len(), FIRST_FRAME_POLL_ATTEMPTS as usize);
        let received = server.received_requests().await.unwrap();
        let body: Value = find(&received, "POST", "/web_api/sns/v2/note").body_json().unwrap();
        assert!(body["video_info"]["cover"]["file_id"].is_null());
    }

    #[tokio::test]
    async fn test_create_note_uploads_cover() {
        let server = MockServer::start().await;
        mount_permit(&server, "video", "spectrum/v1", "tok-v").await;
        mount_permit(&server, "image", "spectrum/c1", "tok-c").await;
        Mock::given(method("PUT"))
            .and(path("/spectrum/v1"))
            .respond_with(ResponseTemplate::new(200).insert_header("X-Ros-Video-Id", "vid-9"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/spectrum/c1"))
            .and(header("X-Cos-Security-Token", "tok-c"))
            .and(header("content-type", "image/jpeg"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/web_api/sns/v1/video/first_frame"))
            .respond_with(success(json!({"first_frame_image_id": "frame-77"})))
            .expect(0)
            .mount(&server)
            .await;
        mount_note(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.jpg");
        std::fs::write(&cover, b"fake jpeg").unwrap();
        let pacer = Arc::new(RecordingPacer::default());
        let client = client_for(&server, Arc::new(FixedSigner), pacer.clone());

        client.create_video_note(&video_request(&dir, Some(cover))).await.unwrap();

        assert!(pacer.pauses.lock().unwrap().is_empty());
        let received = server.received_requests().await.unwrap();
        assert_eq!(find(&received, "PUT", "/spectrum/c1").body, b"fake jpeg".to_vec());
        let body: Value = find(&received, "POST", "/web_api/sns/v2/note").body_json().unwrap();
        assert_eq!(body["video_info"]["cover"]["file_id"], "spectrum/c1");
        assert_eq!(body["video_info"]["cover"]["frame"]["is_upload"], true);
    }

    #[tokio::test]
    async fn test_failed_upload_is_reported() {
        let server = MockServer::start().await;
        mount_permit(&server, "video", "spectrum/v1", "tok-v").await;
        Mock::given(method("PUT"))
            .and(path("/spectrum/v1"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_for(&server, Arc::new(FixedSigner), Arc::new(RecordingPacer::default()));

        let err = client.create_video_note(&video_request(&dir, None)).await.unwrap_err();
        assert!(matches!(err, PlatformError::VideoUploadFailed(ref msg) if msg.contains("AccessDenied")));
    }
}
