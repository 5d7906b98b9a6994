//! Encoder command-line assembly.

use crate::error::EncoderError;
use crate::{EncoderResult, RecorderSettings, INPUT_PIXEL_FORMAT};

/// Input source telling the encoder to read from its stdin.
const PIPE_INPUT: &str = "pipe:";

/// A fully assembled encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderCommand {
    /// Executable to launch.
    pub program: String,

    /// Arguments, one entry per argv slot.
    pub args: Vec<String>,
}

impl EncoderCommand {
    /// Build the invocation for a raw RGBA stdin stream.
    ///
    /// Argument order: overwrite flag, `-an`, pre-args, input rate and size,
    /// raw input format, input args, pipe input, then codec arguments (only
    /// when a codec is set), output args and the output path. Free-form
    /// argument strings that are blank contribute nothing.
    pub fn from_settings(settings: &RecorderSettings) -> EncoderResult<Self> {
        let mut args: Vec<String> = Vec::new();

        args.push(if settings.allow_overwrite { "-y" } else { "-n" }.to_string());
        args.push("-an".to_string());
        args.extend(split_args(&settings.extra_pre_args)?);

        // Input description
        args.push("-framerate".to_string());
        args.push(settings.fps.to_string());
        args.push("-video_size".to_string());
        args.push(format!("{}x{}", settings.width, settings.height));
        args.push("-f".to_string());
        args.push("rawvideo".to_string());
        args.push("-pix_fmt".to_string());
        args.push(INPUT_PIXEL_FORMAT.ffmpeg_name().to_string());
        args.extend(split_args(&settings.extra_input_args)?);
        args.push("-i".to_string());
        args.push(PIPE_INPUT.to_string());

        // Output description
        let codec = settings.video_codec.trim();
        if !codec.is_empty() {
            args.push("-r".to_string());
            args.push(settings.out_fps.to_string());
            args.push("-c:v".to_string());
            args.push(codec.to_string());
            args.push("-b:v".to_string());
            args.push(format!("{}k", settings.bitrate_kbps));
        }
        args.extend(split_args(&settings.extra_output_args)?);
        args.push(settings.output_path.to_string_lossy().into_owned());

        Ok(Self {
            program: settings.encoder_program().to_string(),
            args,
        })
    }

    /// Printable command line, quoting arguments that need it.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_for_display)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_for_display(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", arg.replace('\'', r"'\''"))
    } else {
        arg.to_string()
    }
}

/// Split a free-form argument string into argv entries.
///
/// Whitespace separates arguments. Single quotes keep their content
/// verbatim, double quotes allow `\"` and `\\`, and outside quotes a
/// backslash escapes whitespace, quotes or another backslash. Any other
/// backslash is kept literally so Windows paths survive.
pub fn split_args(input: &str) -> EncoderResult<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some('\'') => {
                if c == '\'' {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            Some(_) => match c {
                '"' => quote = None,
                '\\' if matches!(chars.peek(), Some('"') | Some('\\')) => {
                    current.extend(chars.next());
                }
                _ => current.push(c),
            },
            None => match c {
                c if c.is_whitespace() => {
                    if in_arg {
                        args.push(std::mem::take(&mut current));
                        in_arg = false;
                    }
                }
                '\'' | '"' => {
                    quote = Some(c);
                    in_arg = true;
                }
                '\\' if chars
                    .peek()
                    .is_some_and(|n| n.is_whitespace() || matches!(n, '\'' | '"' | '\\')) =>
                {
                    current.extend(chars.next());
                    in_arg = true;
                }
                _ => {
                    current.push(c);
                    in_arg = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(EncoderError::UnbalancedQuote(input.to_string()));
    }
    if in_arg {
        args.push(current);
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn raw_settings() -> RecorderSettings {
        RecorderSettings {
            output_path: PathBuf::from("out.mp4"),
            fps: 30.0,
            out_fps: 30.0,
            width: 640,
            height: 480,
            bitrate_kbps: 20_000,
            video_codec: String::new(),
            extra_pre_args: String::new(),
            extra_input_args: String::new(),
            extra_output_args: String::new(),
            allow_overwrite: true,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }

    #[test]
    fn test_raw_passthrough_args() {
        let command = EncoderCommand::from_settings(&raw_settings()).unwrap();

        assert_eq!(command.program, "ffmpeg");
        assert_eq!(
            command.args,
            [
                "-y", "-an", "-framerate", "30", "-video_size", "640x480", "-f", "rawvideo",
                "-pix_fmt", "rgba", "-i", "pipe:", "out.mp4",
            ]
        );
    }

    #[test]
    fn test_codec_args_in_order() {
        let settings = RecorderSettings {
            video_codec: "h264_vaapi".to_string(),
            out_fps: 29.97,
            extra_pre_args: "-hwaccel vaapi -vaapi_device /dev/dri/renderD128".to_string(),
            extra_input_args: "-thread_queue_size 512".to_string(),
            extra_output_args: "-vf 'format=nv12,hwupload'".to_string(),
            ..raw_settings()
        };
        let command = EncoderCommand::from_settings(&settings).unwrap();

        assert_eq!(
            command.args,
            [
                "-y",
                "-an",
                "-hwaccel",
                "vaapi",
                "-vaapi_device",
                "/dev/dri/renderD128",
                "-framerate",
                "30",
                "-video_size",
                "640x480",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-thread_queue_size",
                "512",
                "-i",
                "pipe:",
                "-r",
                "29.97",
                "-c:v",
                "h264_vaapi",
                "-b:v",
                "20000k",
                "-vf",
                "format=nv12,hwupload",
                "out.mp4",
            ]
        );
    }

    #[test]
    fn test_blank_segments_are_omitted() {
        let settings = RecorderSettings {
            extra_pre_args: "   ".to_string(),
            extra_input_args: "\t".to_string(),
            extra_output_args: " \n ".to_string(),
            video_codec: "  ".to_string(),
            ..raw_settings()
        };
        let command = EncoderCommand::from_settings(&settings).unwrap();

        assert!(command.args.iter().all(|a| !a.trim().is_empty()));
        assert_eq!(command.args.len(), 13);
    }

    #[test]
    fn test_no_overwrite_flag() {
        let settings = RecorderSettings {
            allow_overwrite: false,
            ..raw_settings()
        };
        let command = EncoderCommand::from_settings(&settings).unwrap();
        assert_eq!(command.args[0], "-n");
    }

    #[test]
    fn test_output_path_with_spaces_is_one_arg() {
        let settings = RecorderSettings {
            output_path: PathBuf::from("my videos/take 1.mp4"),
            ..raw_settings()
        };
        let command = EncoderCommand::from_settings(&settings).unwrap();

        assert_eq!(command.args.last().unwrap(), "my videos/take 1.mp4");
        assert!(command.command_line().ends_with("'my videos/take 1.mp4'"));
    }

    #[test]
    fn test_split_args_quoting() {
        assert_eq!(split_args("").unwrap(), Vec::<String>::new());
        assert_eq!(split_args("  -a  b ").unwrap(), ["-a", "b"]);
        assert_eq!(split_args("-vf 'a b'").unwrap(), ["-vf", "a b"]);
        assert_eq!(split_args(r#"-metadata "title=\"x\"""#).unwrap(), ["-metadata", r#"title="x""#]);
        assert_eq!(split_args(r"a\ b").unwrap(), ["a b"]);
        assert_eq!(split_args(r"C:\tools\ffmpeg").unwrap(), [r"C:\tools\ffmpeg"]);
        assert_eq!(split_args("''").unwrap(), [""]);
    }

    #[test]
    fn test_split_args_unbalanced_quote() {
        assert!(matches!(
            split_args("-vf 'scale=1:2"),
            Err(EncoderError::UnbalancedQuote(_))
        ));
    }
}
