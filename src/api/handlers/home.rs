use axum::response::Html;

const HOME_PAGE: &str = r#"<html>
    <head>
        <title>File Upload Server</title>
        <style>
            body {
                font-family: Arial, sans-serif;
                max-width: 800px;
                margin: 0 auto;
                padding: 20px;
            }
            h1 {
                color: #333;
            }
            form {
                margin: 20px 0;
                padding: 20px;
                border: 1px solid #ddd;
                border-radius: 5px;
            }
        </style>
    </head>
    <body>
        <h1>File Upload Server</h1>
        <p>Upload files to the server using the form below or via POST request to /upload</p>

        <form action="/upload" method="post" enctype="multipart/form-data">
            <input type="file" name="file" required />
            <button type="submit">Upload</button>
        </form>
    </body>
</html>
"#;

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "HTML upload form", body = String, content_type = "text/html")
    ),
    tag = "upload"
)]
pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}
