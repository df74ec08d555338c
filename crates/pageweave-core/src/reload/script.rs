//! Browser side of live reload

/// `<script>` element that reloads the page on every `reload` event from `url`
pub fn client_script(url: &str) -> String {
    // JSON string literals are valid JavaScript string literals
    let quoted = serde_json::Value::from(url).to_string().replace("</", "<\\/");
    format!(
        "<script>(function () {{\n\
         \x20 var source = new EventSource({quoted});\n\
         \x20 source.onmessage = function (event) {{\n\
         \x20   if (event.data === \"reload\") {{ window.location.reload(); }}\n\
         \x20 }};\n\
         \x20 source.onerror = function (err) {{\n\
         \x20   console.warn(\"live reload: event stream disconnected\", err);\n\
         \x20 }};\n\
         }})();</script>\n"
    )
}

/// Insert `script` before the last `</body>` (any case), or append it
pub fn inject(html: &str, script: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..index]);
            out.push_str(script);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, script),
    }
}
