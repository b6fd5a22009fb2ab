use percent_encoding::percent_decode_str;
use url::Url;

/// 地址里推断不出文件名时使用
pub const DEFAULT_FILE_NAME: &str = "index.html";

/// 从地址推断输出文件名：取路径最后一段并做 URL 解码，
/// 再去掉最后一个非法字符（`*|\:"<>?/`）之前的部分。
pub fn guess_file_name(uri: &str) -> String {
    let path = match Url::parse(uri) {
        Ok(url) => url.path().to_string(),
        Err(_) => uri.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let decoded = percent_decode_str(&path).decode_utf8_lossy();
    let name = decoded
        .rsplit(['*', '|', '\\', ':', '"', '<', '>', '?', '/'])
        .next()
        .unwrap_or("");
    if name.is_empty() || name == "." || name == ".." {
        DEFAULT_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}
