mod tests_engine;
mod tests_reentrant_mutex;
