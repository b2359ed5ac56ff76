// Landing page shown when no `url` parameter is given
use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

const LANDING_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>FCORS - CORS Proxy</title>
  <style>
    body { font-family: system-ui, sans-serif; background: #f4f5fb; display: flex; justify-content: center; padding: 40px 16px; }
    main { background: #fff; border-radius: 12px; box-shadow: 0 8px 30px rgba(0,0,0,.12); max-width: 600px; width: 100%; padding: 32px; }
    label { display: block; font-weight: 600; margin: 16px 0 6px; }
    input, select { width: 100%; padding: 10px; border: 1px solid #ccd; border-radius: 6px; box-sizing: border-box; }
    button { margin-top: 20px; padding: 12px 20px; border: 0; border-radius: 6px; background: #667eea; color: #fff; font-weight: 600; cursor: pointer; }
    pre { background: #f7f9fb; padding: 12px; border-radius: 6px; white-space: pre-wrap; word-break: break-all; max-height: 400px; overflow-y: auto; }
    code { background: #e1e8ed; padding: 2px 5px; border-radius: 4px; }
  </style>
</head>
<body>
  <main>
    <h1>FCORS</h1>
    <p>Relay any http(s) URL with CORS headers attached.</p>
    <form id="relay">
      <label for="url">Target URL</label>
      <input type="url" id="url" name="url" placeholder="https://api.example.com/data" required>
      <label for="key">API key</label>
      <input type="password" id="key" name="key" autocomplete="off">
      <label for="reveal">Reveal mode</label>
      <select id="reveal" name="reveal">
        <option value="">Proxy response (default)</option>
        <option value="headers">Show headers only</option>
      </select>
      <button type="submit">Send</button>
    </form>
    <pre id="result" hidden></pre>
    <p>Use <code>?url=</code> to relay a URL, add <code>&amp;reveal=headers</code> to get the
      upstream status and headers as JSON. Send your key in the <code>x-api-key</code> header
      or as <code>?key=</code>. An <code>x-cookie</code> header is forwarded as <code>cookie</code>.</p>
  </main>
  <script>
    const baseUrl = '{{BASE_URL}}';
    document.getElementById('relay').addEventListener('submit', async (e) => {
      e.preventDefault();
      const data = new FormData(e.target);
      const params = new URLSearchParams({ url: data.get('url') });
      if (data.get('reveal')) params.append('reveal', data.get('reveal'));
      const result = document.getElementById('result');
      result.hidden = false;
      result.textContent = 'Loading...';
      try {
        const response = await fetch(`${baseUrl}/?${params}`, { headers: { 'x-api-key': data.get('key') } });
        const type = response.headers.get('content-type') || '';
        result.textContent = type.includes('application/json')
          ? JSON.stringify(await response.json(), null, 2)
          : await response.text();
      } catch (err) {
        result.textContent = `Error: ${err.message}`;
      }
    });
  </script>
</body>
</html>
"#;

/// `scheme://host` of this relay as seen by the caller
fn base_url(headers: &HeaderMap) -> String {
    let scheme = match headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
    {
        Some("https") => "https",
        _ => "http",
    };
    // Host is caller-controlled and lands inside a script literal
    let host: String = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-' | '[' | ']'))
        .collect();
    format!("{}://{}", scheme, host)
}

pub fn landing_page(headers: &HeaderMap) -> Response {
    let html = LANDING_TEMPLATE.replace("{{BASE_URL}}", &base_url(headers));
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        )],
        html,
    )
        .into_response()
}
