mod meta_blocks_tests;
