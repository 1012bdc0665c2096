use super::creds::AuthCode;
use super::error::OAuthServerError;
use super::OAuthServerData;
use ring::rand::SecureRandom;
use std::collections::HashMap;
use tiny_http::{Response, StatusCode};
use tokio::task::JoinHandle;

type ServerJoinHandle = JoinHandle<Result<AuthCode, OAuthServerError>>;

/// A short-lived local server that walks the operator through the DLive
/// authorization flow and catches the redirected-back authorization code.
#[derive(Debug)]
pub struct OAuthServer {
    join_handle: ServerJoinHandle,
}

impl OAuthServer {
    pub fn start_auth(options: OAuthServerData) -> Self {
        let join_handle = tokio::task::spawn_blocking(move || OAuthServer::host_auth(&options));
        OAuthServer { join_handle }
    }
    pub fn into_inner(self) -> ServerJoinHandle {
        self.join_handle
    }

    fn host_auth(options: &OAuthServerData) -> Result<AuthCode, OAuthServerError> {
        let server = tiny_http::Server::http(&options.host_address)
            .map_err(OAuthServerError::OnServerCreate)?;
        let rand = ring::rand::SystemRandom::new();
        let mut current_state = None;

        // https://docs.rs/ring/latest/ring/rand/struct.SystemRandom.html
        rand.fill(&mut []).map_err(OAuthServerError::Ring)?;

        loop {
            let request = server.recv().map_err(OAuthServerError::OnReceive)?;

            match request.url() {
                "/" => {
                    let (url, new_state) = OAuthServer::authorize_redirect_link(options, &rand)
                        .map_err(OAuthServerError::Ring)?;

                    current_state = Some(new_state);

                    request.respond(Response::new(
                        StatusCode(308),
                        vec![tiny_http::Header::from_bytes("Location".as_bytes(), url).unwrap()],
                        "Redirecting...".as_bytes(),
                        None,
                        None,
                    ))
                }
                response if response.starts_with(&options.response_path) => {
                    let Some((_, query)) = response.split_once('?') else {
                        request.respond(OAuthServer::code(400, "Invalid response.")).map_err(OAuthServerError::OnResponse)?;
                        continue;
                    };
                    let Some(params) = OAuthServer::parse_url_params(query) else {
                        request.respond(OAuthServer::code(400, "Invalid response.")).map_err(OAuthServerError::OnResponse)?;
                        continue;
                    };
                    let Some(state) = params.get("state") else {
                        request.respond(OAuthServer::code(400, "Invalid response.")).map_err(OAuthServerError::OnResponse)?;
                        continue;
                    };
                    if current_state.as_ref() != Some(state) {
                        request.respond(OAuthServer::code(403, "Invalid state.")).map_err(OAuthServerError::OnResponse)?;
                        continue;
                    }

                    if let Some(code) = params.get("code") {
                        request
                            .respond(OAuthServer::code(200, "Success!"))
                            .map_err(OAuthServerError::OnResponse)?;
                        return Ok(AuthCode(String::from(code)));
                    }
                    if let Some(error) = params.get("error") {
                        request
                            .respond(OAuthServer::code(500, "DLive error."))
                            .map_err(OAuthServerError::OnResponse)?;
                        return Err(OAuthServerError::OnAuth {
                            error: String::from(error),
                            error_description: params
                                .get("error_description")
                                .map(|description| description.replace('+', " "))
                                .unwrap_or_default(),
                        });
                    }

                    request.respond(OAuthServer::code(400, "Invalid response."))
                }
                _ => request.respond(OAuthServer::code(404, "Not found.")),
            }
            .map_err(OAuthServerError::OnResponse)?
        }
    }

    fn code(code: u16, description: &str) -> Response<&[u8]> {
        Response::new(
            StatusCode(code),
            vec![
                tiny_http::Header::from_bytes("Content-Type".as_bytes(), "text/plain".as_bytes())
                    .unwrap(),
            ],
            description.as_bytes(),
            Some(description.len()),
            None,
        )
    }

    fn authorize_redirect_link(
        options: &OAuthServerData,
        rng: &ring::rand::SystemRandom,
    ) -> Result<(String, String), ring::error::Unspecified> {
        let mut buf = [0; 32];
        rng.fill(&mut buf)?;
        let state: String = buf.into_iter().map(|byte| format!("{:x?}", byte)).collect();
        let redirect_uri = format!("http://{}{}", options.host_address, options.response_path);
        Ok((
            format!(
                "{}?response_type=code&client_id={}&redirect_uri={}&state={state}&scope={}",
                options.authorize_url,
                options.client_id,
                urlencoding::encode(&redirect_uri),
                urlencoding::encode(&options.scopes.join(" "))
            ),
            state,
        ))
    }

    fn parse_url_params(params: &str) -> Option<HashMap<String, String>> {
        params
            .split('&')
            .map(|param| param.split_once('='))
            .map(|maybe_param| maybe_param.map(|(k, v)| (String::from(k), String::from(v))))
            .collect()
    }
}
