mod concurrent_recording;
mod log_lines;
