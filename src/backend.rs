//! AudioGen model backend
//!
//! Runs the pretrained model inside a Python worker process that imports
//! audiocraft. The worker loads the weights once, then serves generation
//! requests over stdin/stdout using the JSON-lines messages in
//! [`crate::protocol`]. Its stderr is inherited so library warnings and
//! tracebacks reach the terminal unchanged.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, warn};

use crate::model::{GenerationParams, ModelInfo, SoundError, SoundModel, Waveform};
use crate::protocol::{WorkerRequest, WorkerResponse};

/// Worker program passed to `python -c`
///
/// argv: model name, device. Everything the library prints to stdout is
/// redirected to stderr so stdout carries protocol lines only.
const WORKER_SCRIPT: &str = r#"
import base64, json, sys
out = sys.stdout
sys.stdout = sys.stderr

def emit(msg):
    out.write(json.dumps(msg) + "\n")
    out.flush()

model_name, device = sys.argv[1], sys.argv[2]
try:
    from audiocraft.models import AudioGen
    model = AudioGen.get_pretrained(model_name, device=None if device == "auto" else device)
except Exception as exc:
    emit({"type": "error", "message": "failed to load %s: %s" % (model_name, exc)})
    sys.exit(1)

emit({"type": "ready", "model": model_name, "sample_rate": int(model.sample_rate),
      "channels": int(getattr(model, "audio_channels", 1))})

for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    req = json.loads(line)
    if req["type"] == "shutdown":
        break
    try:
        model.set_generation_params(duration=req["duration"])
        wav = model.generate(req["prompts"])
        clips = []
        for clip in wav:
            pcm = clip.detach().float().cpu().numpy().astype("<f4")
            clips.append({"channels": int(pcm.shape[0]),
                          "pcm_f32le": base64.b64encode(pcm.tobytes()).decode("ascii")})
        emit({"type": "audio", "id": req["id"], "sample_rate": int(model.sample_rate), "clips": clips})
    except Exception as exc:
        emit({"type": "error", "id": req.get("id"), "message": str(exc)})
"#;

/// Configuration for spawning the worker
#[derive(Clone, Debug, PartialEq)]
pub struct BackendConfig {
    /// Python interpreter with audiocraft installed
    pub python: String,
    /// Pretrained model identifier
    pub model: String,
    /// `auto`, `cpu`, `cuda` or `mps`
    pub device: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            model: crate::config::DEFAULT_MODEL.to_string(),
            device: "auto".to_string(),
        }
    }
}

struct WorkerIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl WorkerIo {
    async fn send(&mut self, req: &WorkerRequest) -> Result<(), SoundError> {
        let mut line = serde_json::to_string(req)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Next protocol line, or `None` once the worker closed stdout
    async fn recv(&mut self) -> Result<Option<WorkerResponse>, SoundError> {
        while let Some(line) = self.stdout.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(line)?));
        }
        Ok(None)
    }
}

/// AudioGen backend hosted in a Python worker process
pub struct AudiocraftBackend {
    info: ModelInfo,
    child: AsyncMutex<Child>,
    io: AsyncMutex<WorkerIo>,
    next_id: AtomicU64,
}

impl AudiocraftBackend {
    /// Start the worker and wait until the model is loaded
    #[instrument(skip_all, fields(model = %config.model, device = %config.device))]
    pub async fn spawn(config: BackendConfig) -> Result<Self, SoundError> {
        let mut child = Command::new(&config.python)
            .arg("-u")
            .arg("-c")
            .arg(WORKER_SCRIPT)
            .arg(&config.model)
            .arg(&config.device)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SoundError::Spawn {
                program: config.python.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SoundError::Protocol("worker stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SoundError::Protocol("worker stdout not captured".to_string()))?;
        let mut io = WorkerIo {
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        debug!(python = %config.python, "waiting for worker to load model");
        let info = match io.recv().await? {
            Some(WorkerResponse::Ready {
                model,
                sample_rate,
                channels,
            }) => ModelInfo {
                name: model,
                sample_rate,
                channels,
            },
            Some(WorkerResponse::Error { message, .. }) => return Err(SoundError::Model(message)),
            Some(other) => {
                return Err(SoundError::Protocol(format!(
                    "expected ready message, got {other:?}"
                )))
            }
            None => return Err(SoundError::WorkerExited(exit_detail(&mut child).await)),
        };

        info!(sample_rate = info.sample_rate, channels = info.channels, "model loaded");
        Ok(Self {
            info,
            child: AsyncMutex::new(child),
            io: AsyncMutex::new(io),
            next_id: AtomicU64::new(1),
        })
    }

    /// Ask the worker to exit and wait for it
    pub async fn shutdown(self) -> Result<(), SoundError> {
        let mut io = self.io.into_inner();
        if let Err(e) = io.send(&WorkerRequest::Shutdown).await {
            warn!(error = %e, "worker did not accept shutdown request");
        }
        drop(io);
        let status = self.child.into_inner().wait().await?;
        debug!(%status, "worker exited");
        Ok(())
    }
}

#[async_trait]
impl SoundModel for AudiocraftBackend {
    fn info(&self) -> ModelInfo {
        self.info.clone()
    }

    #[instrument(skip_all, fields(prompts = prompts.len(), duration = params.duration))]
    async fn generate(
        &self,
        prompts: &[String],
        params: &GenerationParams,
    ) -> Result<Vec<Waveform>, SoundError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = WorkerRequest::Generate {
            id,
            prompts: prompts.to_vec(),
            duration: params.duration,
        };

        // One request in flight at a time
        let mut io = self.io.lock().await;
        io.send(&request).await?;
        let response = io.recv().await?;

        match response {
            Some(WorkerResponse::Audio {
                id: got,
                sample_rate,
                clips,
            }) => {
                if got != id {
                    return Err(SoundError::Protocol(format!(
                        "response for request {got} while waiting for {id}"
                    )));
                }
                if sample_rate != self.info.sample_rate {
                    warn!(
                        expected = self.info.sample_rate,
                        got = sample_rate,
                        "worker changed sample rate"
                    );
                }
                if clips.len() != prompts.len() {
                    return Err(SoundError::ClipCount {
                        expected: prompts.len(),
                        got: clips.len(),
                    });
                }
                clips.iter().map(|c| c.decode()).collect()
            }
            Some(WorkerResponse::Error { message, .. }) => Err(SoundError::Model(message)),
            Some(other) => Err(SoundError::Protocol(format!(
                "unexpected message from worker: {other:?}"
            ))),
            None => {
                drop(io);
                let mut child = self.child.lock().await;
                Err(SoundError::WorkerExited(exit_detail(&mut child).await))
            }
        }
    }
}

/// Describe how the worker exited, for error messages
async fn exit_detail(child: &mut Child) -> String {
    match child.wait().await {
        Ok(status) => format!(" ({status})"),
        Err(e) => format!(" (status unavailable: {e})"),
    }
}
