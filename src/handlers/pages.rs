use actix_web::HttpResponse;

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>Tomography report</title>
    <style>
      body { font-family: sans-serif; margin: 2em; max-width: 60em; }
      fieldset { margin-bottom: 1.5em; }
      img { max-width: 256px; image-rendering: pixelated; margin-right: 1em; }
      .gallery { display: flex; flex-wrap: wrap; }
      .error { color: #b00; }
    </style>
  </head>
  <body>
    <h1>Tomography report</h1>
    <p><a href="/about.html">About</a></p>

    <fieldset>
      <legend>Phantom</legend>
      <form id="form-phantom">
        <label>Size <input name="size" type="number" min="1" max="2048" value="128"></label>
        <label>Angles <input name="angles" type="number" min="1" max="3600" value="180"></label>
        <button type="submit">Build phantom</button>
        <button type="button" data-backend="buzmakov">Reconstruct (SART)</button>
        <button type="button" data-backend="prun">Reconstruct (external)</button>
      </form>
      <div id="phantom-response" class="gallery"></div>
    </fieldset>

    <fieldset>
      <legend>Upload sinogram</legend>
      <form id="form-sinogram-upload" enctype="multipart/form-data">
        <input type="file" name="file">
        <button type="submit">Upload</button>
        <button type="button" data-backend="buzmakov" disabled>Reconstruct (SART)</button>
        <button type="button" data-backend="prun" disabled>Reconstruct (external)</button>
      </form>
      <div id="form-sinogram-upload-response"></div>
      <div id="upload-reconstruction" class="gallery"></div>
    </fieldset>

    <script>
      function show(target, html) {
        document.getElementById(target).innerHTML = html;
      }

      function image(url) {
        return '<a href="' + url + '"><img src="' + url + '"></a>';
      }

      async function getJson(url) {
        const resp = await fetch(url);
        const body = await resp.json();
        if (!resp.ok) {
          throw new Error(body.details || body.error);
        }
        return body;
      }

      async function reconstruct(backend, query, target) {
        show(target, 'Reconstructing...');
        try {
          const body = await getJson('/_reconstruct_' + backend + '?' + query);
          show(target, image(body.image) + '<p>' + body.status + ', <a href="' + body.link + '">data</a></p>');
        } catch (e) {
          show(target, '<span class="error">' + e.message + '</span>');
        }
      }

      const phantom = document.getElementById('form-phantom');
      function phantomQuery() {
        const data = new FormData(phantom);
        return 'sinogram_mode=phantom&size=' + data.get('size') + '&angles=' + data.get('angles');
      }
      phantom.addEventListener('submit', async (event) => {
        event.preventDefault();
        show('phantom-response', 'Building...');
        try {
          const data = new FormData(phantom);
          const body = await getJson('/_build_phantom?size=' + data.get('size') + '&angles=' + data.get('angles'));
          show('phantom-response', image(body.phantom_image) + image(body.sinogramm_image));
        } catch (e) {
          show('phantom-response', '<span class="error">' + e.message + '</span>');
        }
      });
      phantom.querySelectorAll('button[data-backend]').forEach((button) => {
        button.addEventListener('click', () =>
          reconstruct(button.dataset.backend, phantomQuery(), 'phantom-response'));
      });

      const upload = document.getElementById('form-sinogram-upload');
      let uploadedId = null;
      upload.addEventListener('submit', async (event) => {
        event.preventDefault();
        show('form-sinogram-upload-response', 'Uploading...');
        const resp = await fetch('/_upload_sinogram', { method: 'POST', body: new FormData(upload) });
        if (resp.ok) {
          uploadedId = resp.headers.get('X-Sinogram-Id');
          show('form-sinogram-upload-response', await resp.text());
        } else {
          const body = await resp.json();
          uploadedId = null;
          show('form-sinogram-upload-response', '<span class="error">' + (body.details || body.error) + '</span>');
        }
        upload.querySelectorAll('button[data-backend]').forEach((b) => { b.disabled = !uploadedId; });
      });
      upload.querySelectorAll('button[data-backend]').forEach((button) => {
        button.addEventListener('click', () =>
          reconstruct(button.dataset.backend, 'sinogram_mode=upload&id=' + uploadedId, 'upload-reconstruction'));
      });
    </script>
  </body>
</html>
"##;

const ABOUT_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>About - Tomography report</title>
  </head>
  <body>
    <h1>About</h1>
    <p>
      Builds modified Shepp-Logan phantoms and their parallel-beam sinograms,
      stores uploaded sinograms under their SHA-1, and reconstructs either
      with in-process SART or with an external reconstructor.
    </p>
    <p>
      Every artifact is written once under <code>/static/data</code> and
      served from there on later requests.
    </p>
    <p><a href="/">Back</a></p>
  </body>
</html>
"##;

fn html(body: &'static str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

pub async fn index() -> HttpResponse {
    html(INDEX_HTML)
}

pub async fn about() -> HttpResponse {
    html(ABOUT_HTML)
}

#[cfg(test)]
mod tests {
    use actix_web::test as actix_test;
    use rstest::rstest;

    use crate::handlers::test_support;

    #[rstest]
    #[case("/", "form-sinogram-upload")]
    #[case("/index.html", "multipart/form-data")]
    #[case("/about.html", "Shepp-Logan")]
    #[actix_web::test]
    async fn serves_pages(#[case] uri: &str, #[case] marker: &str) {
        let tmp = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(test_support::app(test_support::state(tmp.path()))).await;

        let resp =
            actix_test::call_service(&app, actix_test::TestRequest::get().uri(uri).to_request()).await;
        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/html; charset=utf-8"
        );
        let body = actix_test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains(marker));
    }
}
