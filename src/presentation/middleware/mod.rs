mod rate_limit;

pub use rate_limit::{
    ClientRateLimiter, RATE_LIMIT_HEADER, RateLimit, rate_limit_middleware,
};
