mod tests_page;
mod tests_tree;
