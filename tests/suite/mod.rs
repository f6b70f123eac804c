mod fallback;
mod gateway;
mod jobs;
mod session;
